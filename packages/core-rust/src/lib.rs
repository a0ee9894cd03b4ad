//! Ruler fork core: backend kinds, datasource references, request context, and payloads.

pub mod backend;
pub mod context;
pub mod datasource;
pub mod payloads;
pub mod types;

pub use backend::BackendKind;
pub use context::RequestContext;
pub use datasource::{DatasourceMeta, DatasourceRef, NATIVE_RECIPIENT};
pub use payloads::{AlertCondition, AlertQuery, EvalQueriesPayload, RelativeTimeRange, TestRulePayload};
pub use types::Principal;

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
