//! CrudService: generic entity verbs using the safe SQL builder.

mod crud;
mod filter;
pub use crud::CrudService;
pub use filter::ListFilter;
