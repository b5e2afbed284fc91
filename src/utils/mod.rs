pub mod sql_naming;
