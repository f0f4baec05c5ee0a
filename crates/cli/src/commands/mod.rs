pub mod onboard;
pub mod run;
pub mod score;
pub mod status;
