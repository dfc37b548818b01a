//! `GET /api/funcs` (`spec.md` §6): the module & function catalog, grouped
//! by package, with settings/inputs/outputs schemas serialized the way
//! `spec.md` §6's "Function-catalog serialization" describes.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use opensight_config::{FunctionF, InputOutputF, ModuleF, Schema, SchemaF};

use crate::AppState;

pub(crate) fn routes() -> Router<AppState> {
    Router::new().route("/api/funcs", get(list_funcs))
}

async fn list_funcs(State(state): State<AppState>) -> Json<SchemaF> {
    let mut by_package: BTreeMap<String, Vec<FunctionF>> = BTreeMap::new();

    for (func_type, descriptor) in state.manager.funcs() {
        let Some((package, _class_name)) = func_type.split_once('/') else {
            continue;
        };
        by_package.entry(package.to_string()).or_default().push(FunctionF {
            name: descriptor.class_name.to_string(),
            func_type: func_type.clone(),
            settings: schema_to_map(&descriptor.settings_schema),
            inputs: schema_to_map(&descriptor.inputs_schema),
            outputs: schema_to_map(&descriptor.outputs_schema),
        });
    }

    let modules = state
        .manager
        .modules()
        .values()
        .map(|info| ModuleF {
            package: info.package.clone(),
            version: info.version.clone(),
            funcs: by_package.remove(&info.package).unwrap_or_default(),
        })
        .collect();

    Json(SchemaF { modules })
}

fn schema_to_map(schema: &Schema) -> BTreeMap<String, InputOutputF> {
    schema
        .fields
        .iter()
        .map(|field| {
            (
                field.name.clone(),
                InputOutputF::from_value_type(&field.value_type, field.default.as_ref()),
            )
        })
        .collect()
}
