//! Aggregate persistence on top of the query engine.

mod generic;
mod mapper;
mod page;
mod record;
mod uow;

pub use generic::GenericRepository;
pub use mapper::EntityMapper;
pub use page::Page;
pub use record::{
    AggregateRecord, ChildTable, Children, Column, DeletePolicy, EntityDescriptor, MappingError,
    RecordRow,
};
pub use uow::{UnitOfWork, in_unit_of_work};
