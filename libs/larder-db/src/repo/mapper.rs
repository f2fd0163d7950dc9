use crate::repo::record::{AggregateRecord, Children, EntityDescriptor, MappingError};

/// Bidirectional translator between one aggregate type and its storage rows.
///
/// Implementations are pure: no caching, no I/O, and the input aggregate is never
/// mutated. Owned collections are either emitted as [`Children`] rows (join tables)
/// or serialized into root columns, as the context chooses.
pub trait EntityMapper: Send + Sync {
    type Aggregate: Send + Sync;

    fn descriptor(&self) -> &'static EntityDescriptor;

    /// Flatten the root, copying the aggregate's current version.
    ///
    /// # Errors
    /// `MappingError` if a value cannot be represented in storage.
    fn to_record(&self, aggregate: &Self::Aggregate) -> Result<AggregateRecord, MappingError>;

    /// Rows of every owned collection kept in a child table, foreign keys included.
    ///
    /// # Errors
    /// `MappingError` if a value cannot be represented in storage.
    fn to_children(&self, aggregate: &Self::Aggregate) -> Result<Children, MappingError>;

    /// Rebuild the aggregate from its root record and child rows.
    ///
    /// # Errors
    /// `MappingError` if a required field is missing or a child row does not
    /// belong to the root.
    fn to_aggregate(
        &self,
        record: AggregateRecord,
        children: Children,
    ) -> Result<Self::Aggregate, MappingError>;
}
