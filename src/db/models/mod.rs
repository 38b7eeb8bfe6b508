pub mod activity_record;

pub use activity_record::ActivityRecord;
