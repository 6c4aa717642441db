mod disk_scheduler_test;
mod table_heap_test;
