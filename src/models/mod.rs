pub mod assignment;
pub mod course;
pub mod session;

pub use assignment::{Assignment, AssignmentView, AssignmentWithCourse, NewAssignmentRequest};
pub use course::{Course, NewCourseRequest};
pub use session::{Session, SessionWithAssignments};
