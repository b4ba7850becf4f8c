pub(crate) mod demo;
pub(crate) mod worker;
