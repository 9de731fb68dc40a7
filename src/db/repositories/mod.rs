pub mod schema;
pub mod widget;
