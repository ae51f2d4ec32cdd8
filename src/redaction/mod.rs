pub mod redactor;
