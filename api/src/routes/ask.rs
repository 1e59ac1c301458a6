pub mod ask_question_route;
pub mod ask_request;
