#[cfg(test)]
pub mod test {
    use std::collections::HashSet;
    use std::sync::Arc;

    use tempfile::tempdir;

    use crate::buffer::buffer_pool_manager::BufferPoolManager;
    use crate::catalog::schema::{Column, Schema};
    use crate::common::{PageId, Rid};
    use crate::db_types::value::Value;
    use crate::storage::table::table_heap::TableHeap;
    use crate::storage::tuple::Tuple;

    fn test_schema() -> Schema {
        Schema::new(
            "test_table",
            vec![Column::integer("id"), Column::varchar("name", 64)],
        )
    }

    fn make_tuple(schema: &Schema, id: i32, name: &str) -> Tuple {
        Tuple::new(&[Value::integer(id), Value::varchar(name)], schema)
    }

    #[test]
    fn crud_round_trip() {
        let dir = tempdir().unwrap();
        let bpm = Arc::new(BufferPoolManager::new(50, 2, dir.path().join("test.db")).unwrap());
        let schema = test_schema();
        let mut heap = TableHeap::create(Arc::clone(&bpm)).unwrap();

        let mut rids = Vec::new();
        for i in 0..100 {
            let rid = heap.insert_tuple(&make_tuple(&schema, i, &format!("user_{}", i)));
            assert!(rid.is_valid(), "insert failed at {}", i);
            rids.push(rid);
        }

        for (i, rid) in rids.iter().enumerate() {
            let tuple = heap.get_tuple(*rid);
            assert_eq!(tuple.value(&schema, 0).as_integer(), Some(i as i32));
            assert_eq!(
                tuple.value(&schema, 1).as_str(),
                Some(format!("user_{}", i).as_str())
            );
        }

        // Updates of equal serialized size go in place.
        for (i, rid) in rids.iter().take(50).enumerate() {
            let updated = make_tuple(&schema, i as i32 + 1000, &format!("updated_{}", i));
            assert!(heap.update_tuple(&updated, *rid));
        }
        for (i, rid) in rids.iter().take(50).enumerate() {
            let tuple = heap.get_tuple(*rid);
            assert_eq!(tuple.value(&schema, 0).as_integer(), Some(i as i32 + 1000));
        }

        for rid in &rids[50..] {
            assert!(heap.mark_deleted(*rid));
        }
        for rid in &rids[50..] {
            assert!(heap.get_tuple(*rid).is_empty());
        }
    }

    #[test]
    fn iterator_skips_deleted() {
        let dir = tempdir().unwrap();
        let bpm = Arc::new(BufferPoolManager::new(50, 2, dir.path().join("test.db")).unwrap());
        let schema = test_schema();
        let mut heap = TableHeap::create(Arc::clone(&bpm)).unwrap();

        const NUM_TUPLES: usize = 200;
        for i in 0..NUM_TUPLES {
            heap.insert_tuple(&make_tuple(&schema, i as i32, &format!("iter_{}", i)));
        }

        assert_eq!(heap.iter().count(), NUM_TUPLES);

        // Tuples come back in insertion order; collect the first 50 rids and
        // tombstone them.
        let to_delete: Vec<Rid> = heap.iter().take(50).map(|t| t.rid()).collect();
        for rid in &to_delete {
            assert!(heap.mark_deleted(*rid));
        }

        let mut remaining = 0;
        for tuple in heap.iter() {
            assert!(!tuple.is_empty());
            assert!(tuple.value(&schema, 0).as_integer().unwrap() >= 50);
            remaining += 1;
        }
        assert_eq!(remaining, NUM_TUPLES - 50);
    }

    #[test]
    fn empty_heap_iterates_nothing() {
        let dir = tempdir().unwrap();
        let bpm = Arc::new(BufferPoolManager::new(10, 2, dir.path().join("test.db")).unwrap());
        let schema = test_schema();
        let mut heap = TableHeap::create(Arc::clone(&bpm)).unwrap();

        assert!(heap.iter() == heap.end());
        assert_eq!(heap.iter().count(), 0);

        // One insert followed by its delete leaves only a tombstone behind.
        let rid = heap.insert_tuple(&make_tuple(&schema, 1, "temp"));
        assert!(heap.mark_deleted(rid));
        assert!(heap.iter() == heap.end());
    }

    #[test]
    fn inserts_spill_across_pages() {
        let dir = tempdir().unwrap();
        let bpm = Arc::new(BufferPoolManager::new(50, 2, dir.path().join("test.db")).unwrap());
        let schema = test_schema();
        let mut heap = TableHeap::create(Arc::clone(&bpm)).unwrap();

        const NUM_TUPLES: usize = 500;
        let mut rids = Vec::new();
        for i in 0..NUM_TUPLES {
            let rid = heap.insert_tuple(&make_tuple(&schema, i as i32, &format!("user_{}", i)));
            assert!(rid.is_valid());
            rids.push(rid);
        }

        let pages_used: HashSet<PageId> = rids.iter().map(|rid| rid.page_id()).collect();
        assert!(pages_used.len() > 1, "500 tuples should span pages");

        for (i, rid) in rids.iter().enumerate() {
            let tuple = heap.get_tuple(*rid);
            assert_eq!(tuple.value(&schema, 0).as_integer(), Some(i as i32));
            assert_eq!(
                tuple.value(&schema, 1).as_str(),
                Some(format!("user_{}", i).as_str())
            );
        }

        // The iterator sees every live tuple exactly once, pages in chain
        // order.
        let seen: Vec<i32> = heap
            .iter()
            .map(|t| t.value(&schema, 0).as_integer().unwrap())
            .collect();
        assert_eq!(seen.len(), NUM_TUPLES);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn reopen_existing_heap() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");

        let first_page_id;
        let mut rids = Vec::new();
        {
            let bpm = Arc::new(BufferPoolManager::new(50, 2, &db_path).unwrap());
            let mut heap = TableHeap::create(Arc::clone(&bpm)).unwrap();
            first_page_id = heap.first_page_id();

            let schema = test_schema();
            for i in 0..200 {
                rids.push(heap.insert_tuple(&make_tuple(&schema, i, &format!("persist_{}", i))));
            }
            // Dropping the pool flushes the dirty chain.
        }

        let bpm = Arc::new(BufferPoolManager::new(50, 2, &db_path).unwrap());
        let schema = test_schema();
        let heap = TableHeap::open(Arc::clone(&bpm), first_page_id);
        assert!(heap.last_page_id() > heap.first_page_id());

        for (i, rid) in rids.iter().enumerate() {
            let tuple = heap.get_tuple(*rid);
            assert_eq!(tuple.value(&schema, 0).as_integer(), Some(i as i32));
            assert_eq!(
                tuple.value(&schema, 1).as_str(),
                Some(format!("persist_{}", i).as_str())
            );
        }
    }

    #[test]
    fn appends_continue_on_reopened_heap() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");

        let first_page_id;
        {
            let bpm = Arc::new(BufferPoolManager::new(20, 2, &db_path).unwrap());
            let mut heap = TableHeap::create(Arc::clone(&bpm)).unwrap();
            first_page_id = heap.first_page_id();

            let schema = test_schema();
            for i in 0..100 {
                heap.insert_tuple(&make_tuple(&schema, i, "before"));
            }
        }

        let bpm = Arc::new(BufferPoolManager::new(20, 2, &db_path).unwrap());
        let schema = test_schema();
        let mut heap = TableHeap::open(Arc::clone(&bpm), first_page_id);

        let rid = heap.insert_tuple(&make_tuple(&schema, 777, "after"));
        assert!(rid.is_valid());
        assert_eq!(rid.page_id(), heap.last_page_id());
        assert_eq!(heap.get_tuple(rid).value(&schema, 0).as_integer(), Some(777));
        assert_eq!(heap.iter().count(), 101);
    }

    #[test]
    fn oversized_update_leaves_tuple_readable() {
        let dir = tempdir().unwrap();
        let bpm = Arc::new(BufferPoolManager::new(10, 2, dir.path().join("test.db")).unwrap());
        let mut heap = TableHeap::create(Arc::clone(&bpm)).unwrap();

        // One record takes nearly the whole page.
        let big = Tuple::from_slice(Rid::default(), &vec![7u8; 4000]);
        let rid = heap.insert_tuple(&big);
        assert!(rid.is_valid());

        let bigger = Tuple::from_slice(Rid::default(), &vec![8u8; 4050]);
        assert!(!heap.update_tuple(&bigger, rid));

        let tuple = heap.get_tuple(rid);
        assert_eq!(tuple.storage_size(), 4000);
        assert_eq!(tuple.data(), &vec![7u8; 4000][..]);
    }

    #[test]
    fn null_values_round_trip_through_heap() {
        let dir = tempdir().unwrap();
        let bpm = Arc::new(BufferPoolManager::new(10, 2, dir.path().join("test.db")).unwrap());
        let schema = test_schema();
        let mut heap = TableHeap::create(Arc::clone(&bpm)).unwrap();

        let tuple = Tuple::new(
            &[Value::integer(5), Value::null(crate::db_types::value::TypeId::Varchar)],
            &schema,
        );
        let rid = heap.insert_tuple(&tuple);

        let read_back = heap.get_tuple(rid);
        assert_eq!(read_back.value(&schema, 0).as_integer(), Some(5));
        assert!(read_back.value(&schema, 1).is_null());
    }
}
