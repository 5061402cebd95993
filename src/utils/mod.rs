pub mod decimal;
pub mod documento;
