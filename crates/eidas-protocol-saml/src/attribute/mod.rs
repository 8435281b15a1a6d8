//! Attribute model: values, definitions and registries.

mod definition;
mod registry;
mod value;

pub use definition::{
    AttributeDefinition, AttributeDefinitionBuilder, AttributeValueMarshaller, DateMarshaller,
    GenderMarshaller, PersonType, StringMarshaller, XmlType,
};
pub use registry::AttributeRegistry;
pub use value::{AttributeStatus, AttributeValue};
