#[cfg(test)]
mod tests {
    use crate::engine::tests::helpers::*;
    use crate::engine::{LsmDao, LsmDaoConfig};
    use tempfile::TempDir;

    #[test]
    fn close_flushes_nonempty_memtable() {
        init_tracing();
        let tmp = TempDir::new().unwrap();
        let mut dao = LsmDao::open_with_clock(
            tmp.path(),
            LsmDaoConfig { flush_threshold: NO_FLUSH_THRESHOLD },
            counting_clock(),
        )
        .unwrap();

        dao.upsert(b"a".to_vec(), b"1".to_vec()).unwrap();
        dao.close().unwrap();

        assert!(tmp.path().join("0.dat").exists());
    }

    #[test]
    fn close_on_empty_memtable_writes_nothing_new() {
        init_tracing();
        let tmp = TempDir::new().unwrap();
        let mut dao = LsmDao::open_with_clock(
            tmp.path(),
            LsmDaoConfig { flush_threshold: NO_FLUSH_THRESHOLD },
            counting_clock(),
        )
        .unwrap();

        dao.close().unwrap();
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn persistence_across_close_and_reopen() {
        init_tracing();
        let tmp = TempDir::new().unwrap();
        {
            let mut dao = LsmDao::open_with_clock(
                tmp.path(),
                LsmDaoConfig { flush_threshold: NO_FLUSH_THRESHOLD },
                counting_clock(),
            )
            .unwrap();
            dao.upsert(b"a".to_vec(), b"1".to_vec()).unwrap();
            dao.upsert(b"b".to_vec(), b"2".to_vec()).unwrap();
            dao.remove(b"b".to_vec()).unwrap();
            dao.close().unwrap();
        }

        let dao = LsmDao::open_with_clock(
            tmp.path(),
            LsmDaoConfig { flush_threshold: NO_FLUSH_THRESHOLD },
            counting_clock(),
        )
        .unwrap();
        let records: Vec<Vec<u8>> = dao.iterator(b"").unwrap().map(|r| r.unwrap().key).collect();
        assert_eq!(records, vec![b"a".to_vec()]);
    }
}
