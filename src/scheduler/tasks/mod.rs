pub mod minute;
