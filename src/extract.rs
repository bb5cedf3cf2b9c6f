pub mod includes;
