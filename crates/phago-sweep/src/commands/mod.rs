pub mod check;
pub mod expand;
pub mod run;
