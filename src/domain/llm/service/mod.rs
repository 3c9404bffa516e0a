pub mod llm_chat_service;
pub mod llm_model_service;
pub mod llm_request_validator;
