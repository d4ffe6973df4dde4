pub mod matches;
pub mod rock_paper_scissors;
