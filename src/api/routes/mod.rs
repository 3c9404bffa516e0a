//! API route declarations (e.g., /api/*)

pub mod llm_routes;
