pub mod lifetime_escape;
pub mod realloc;
pub mod shallow_copy;
