/*!
Module with basic types used in dumpflow.
*/

pub mod address;
#[doc(hidden)]
pub use address::Address;

pub mod size;
