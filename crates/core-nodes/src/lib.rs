//! The built-in demo module: a small set of Functions exercising every
//! scenario `spec.md` §8 names literally — `Five`/`Sum`/`Print` for the
//! topological/pruning properties, `IsInRange` for the `Range` widget,
//! and `Switch` for cancellation propagation.

use opensight_config::{
    DynValue, FieldSchema, FunctionFlags, Range, RangeWidget, Record, Schema, ValueType,
};
use opensight_engine::{CancelScope, Function, FunctionDescriptor, FunctionError, Outcome};
use opensight_manager::{ModuleError, ModuleRegistrar, ModuleSource};

/// Registers every Function in this module under the `core` package.
pub struct CoreModule;

impl ModuleSource for CoreModule {
    fn package(&self) -> &str {
        "core"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn register(&self, registrar: &mut ModuleRegistrar) -> Result<(), ModuleError> {
        registrar.register_function(five_descriptor())?;
        registrar.register_function(sum_descriptor())?;
        registrar.register_function(print_descriptor())?;
        registrar.register_function(is_in_range_descriptor())?;
        registrar.register_function(switch_descriptor())
    }
}

fn int(name: &str) -> FieldSchema {
    FieldSchema::new(name, ValueType::Int)
}

fn any(name: &str) -> FieldSchema {
    FieldSchema::new(name, ValueType::Any)
}

fn bool_field(name: &str) -> FieldSchema {
    FieldSchema::new(name, ValueType::Bool)
}

// ---- Five ----

struct Five;

impl Function for Five {
    fn run(&mut self, _inputs: &Record, _cancel: &mut CancelScope<'_>) -> Result<Outcome, FunctionError> {
        let mut out = Record::new();
        out.insert("five".to_string(), DynValue::Int(5));
        Ok(Outcome::Produced(out))
    }
}

fn five_descriptor() -> FunctionDescriptor {
    FunctionDescriptor {
        class_name: "Five",
        settings_schema: Schema::default(),
        inputs_schema: Schema::default(),
        outputs_schema: Schema::new(vec![int("five")]),
        flags: FunctionFlags::default(),
        construct: |_settings| Ok(Box::new(Five)),
        validate_settings: |settings| Ok(settings),
    }
}

// ---- Sum ----

struct Sum;

impl Function for Sum {
    fn run(&mut self, inputs: &Record, _cancel: &mut CancelScope<'_>) -> Result<Outcome, FunctionError> {
        let num1 = as_int(inputs, "num1")?;
        let num2 = as_int(inputs, "num2")?;
        let mut out = Record::new();
        out.insert("out".to_string(), DynValue::Int(num1 + num2));
        Ok(Outcome::Produced(out))
    }
}

fn sum_descriptor() -> FunctionDescriptor {
    FunctionDescriptor {
        class_name: "Sum",
        settings_schema: Schema::default(),
        inputs_schema: Schema::new(vec![int("num1"), int("num2")]),
        outputs_schema: Schema::new(vec![int("out")]),
        flags: FunctionFlags::default(),
        construct: |_settings| Ok(Box::new(Sum)),
        validate_settings: |settings| Ok(settings),
    }
}

// ---- Print ----

struct Print;

impl Function for Print {
    fn run(&mut self, inputs: &Record, _cancel: &mut CancelScope<'_>) -> Result<Outcome, FunctionError> {
        if let Some(value) = inputs.get("val") {
            tracing::info!(?value, "Print node output");
        }
        Ok(Outcome::Empty)
    }
}

fn print_descriptor() -> FunctionDescriptor {
    FunctionDescriptor {
        class_name: "Print",
        settings_schema: Schema::default(),
        inputs_schema: Schema::new(vec![any("val")]),
        outputs_schema: Schema::default(),
        flags: FunctionFlags {
            has_sideeffect: true,
            ..Default::default()
        },
        construct: |_settings| Ok(Box::new(Print)),
        validate_settings: |settings| Ok(settings),
    }
}

// ---- IsInRange ----

const IS_IN_RANGE_WIDGET: RangeWidget = RangeWidget {
    min: 0.0,
    max: 100.0,
    decimal: true,
};

struct IsInRange {
    range: Range,
}

impl Function for IsInRange {
    fn run(&mut self, inputs: &Record, _cancel: &mut CancelScope<'_>) -> Result<Outcome, FunctionError> {
        let num = match inputs.get("num") {
            Some(DynValue::Float(f)) => *f,
            Some(DynValue::Int(i)) => *i as f64,
            _ => return Err(FunctionError::Run("num input missing".to_string())),
        };
        let in_range = num >= self.range.min && num <= self.range.max;
        let mut out = Record::new();
        out.insert("in_range".to_string(), DynValue::Bool(in_range));
        Ok(Outcome::Produced(out))
    }
}

fn is_in_range_descriptor() -> FunctionDescriptor {
    FunctionDescriptor {
        class_name: "IsInRange",
        settings_schema: Schema::new(vec![FieldSchema::new(
            "range",
            ValueType::Range(IS_IN_RANGE_WIDGET),
        )]),
        inputs_schema: Schema::new(vec![FieldSchema::new("num", ValueType::Float)]),
        outputs_schema: Schema::new(vec![bool_field("in_range")]),
        flags: FunctionFlags::default(),
        construct: |settings| {
            let range = match settings.get("range") {
                Some(DynValue::Range(range)) => *range,
                _ => {
                    return Err(FunctionError::Construct(
                        "missing or invalid range setting".to_string(),
                    ))
                }
            };
            Ok(Box::new(IsInRange { range }))
        },
        validate_settings: |settings| Ok(settings),
    }
}

// ---- Switch ----

struct Switch;

impl Function for Switch {
    fn run(&mut self, inputs: &Record, cancel: &mut CancelScope<'_>) -> Result<Outcome, FunctionError> {
        let thru = inputs.get("thru").cloned().unwrap_or(DynValue::Bool(false));
        let state = matches!(inputs.get("state"), Some(DynValue::Bool(true)));

        let mut out = Record::new();
        if state {
            out.insert("on".to_string(), thru);
            cancel.cancel_output("off");
        } else {
            out.insert("off".to_string(), thru);
            cancel.cancel_output("on");
        }
        Ok(Outcome::Produced(out))
    }
}

fn switch_descriptor() -> FunctionDescriptor {
    FunctionDescriptor {
        class_name: "Switch",
        settings_schema: Schema::default(),
        inputs_schema: Schema::new(vec![any("thru"), bool_field("state")]),
        outputs_schema: Schema::new(vec![any("on"), any("off")]),
        flags: FunctionFlags::default(),
        construct: |_settings| Ok(Box::new(Switch)),
        validate_settings: |settings| Ok(settings),
    }
}

fn as_int(inputs: &Record, name: &str) -> Result<i64, FunctionError> {
    match inputs.get(name) {
        Some(DynValue::Int(i)) => Ok(*i),
        _ => Err(FunctionError::Run(format!("{name} input missing"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opensight_engine::{FunctionCatalog, Pipeline};
    use opensight_manager::Manager;
    use std::sync::Arc;

    fn pipeline() -> (Pipeline, Arc<Manager>) {
        let manager = Arc::new(Manager::register_all(vec![Box::new(CoreModule)]));
        let catalog: Arc<dyn FunctionCatalog> = manager.clone();
        (Pipeline::new(catalog), manager)
    }

    #[test]
    fn sum_scenario_prints_fifteen_and_prunes_to_fixed_point() {
        let (mut p, _manager) = pipeline();
        p.create_node("core/Five".into(), "A".into());
        p.create_node("core/Sum".into(), "B".into());
        p.create_node("core/Print".into(), "C".into());
        p.set_static_link(&"B".to_string(), "num2".into(), DynValue::Int(10));
        p.create_links(
            &"B".to_string(),
            std::collections::BTreeMap::from([("num1".to_string(), ("A".to_string(), "five".to_string()))]),
        )
        .unwrap();
        p.create_links(
            &"C".to_string(),
            std::collections::BTreeMap::from([("val".to_string(), ("B".to_string(), "out".to_string()))]),
        )
        .unwrap();

        p.evaluate();
        assert_eq!(
            p.node("B").unwrap().result.as_ref().unwrap().get("out"),
            Some(&DynValue::Int(15))
        );

        p.prune_nodetree(&std::collections::BTreeSet::new());
        assert!(p.is_empty());
    }

    #[test]
    fn is_in_range_reports_membership() {
        let (mut p, _manager) = pipeline();
        p.create_node("core/IsInRange".into(), "R".into());
        p.set_static_link(&"R".to_string(), "num".into(), DynValue::Float(20.0));
        let mut settings = Record::new();
        settings.insert(
            "range".to_string(),
            DynValue::Range(Range { min: 10.0, max: 70.0 }),
        );
        p.node_mut("R").unwrap().settings = Some(settings);

        p.evaluate();
        assert_eq!(
            p.node("R").unwrap().result.as_ref().unwrap().get("in_range"),
            Some(&DynValue::Bool(true))
        );
    }

    #[test]
    fn switch_cancels_the_inactive_branch_only() {
        let (mut p, _manager) = pipeline();
        p.create_node("core/Switch".into(), "SW".into());
        p.create_node("core/Sum".into(), "OFF_SUM".into());
        p.set_static_link(&"SW".to_string(), "thru".into(), DynValue::Int(1));
        p.set_static_link(&"SW".to_string(), "state".into(), DynValue::Bool(true));
        p.set_static_link(&"OFF_SUM".to_string(), "num2".into(), DynValue::Int(0));
        p.create_links(
            &"OFF_SUM".to_string(),
            std::collections::BTreeMap::from([("num1".to_string(), ("SW".to_string(), "off".to_string()))]),
        )
        .unwrap();

        p.evaluate();
        assert!(p.node("SW").unwrap().has_run);
        assert!(
            !p.node("OFF_SUM").unwrap().has_run,
            "the off-branch consumer must be skipped when state=true"
        );
    }
}
