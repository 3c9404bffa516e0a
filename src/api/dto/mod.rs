//! API DTOs
pub mod llm_dto;
