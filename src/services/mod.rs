pub mod lifecycle;
pub mod notifier;
pub mod registry;
pub mod reservation;
pub mod seating;
