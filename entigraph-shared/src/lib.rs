pub mod pagination;
pub mod record;
pub mod reference;
pub mod wire;
