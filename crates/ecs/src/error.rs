use pixelscene_common::EntityId;

use crate::component::ComponentKind;
use crate::query::QueryId;

/// Errors from store mutations and query lookups.
///
/// All of them leave the store exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EcsError {
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),
    #[error("invalid value for component `{kind}`: {reason}")]
    InvalidComponentValue { kind: ComponentKind, reason: String },
    #[error("component `{0}` given more than once")]
    DuplicateComponent(ComponentKind),
    #[error("unknown query {0:?}")]
    UnknownQuery(QueryId),
}
