mod activity_records;
