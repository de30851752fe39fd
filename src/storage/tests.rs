//! Unit tests for the striped storage engine
//!
//! Tests cover:
//! - Stripe partitioning, padding and parity layout on disk
//! - Round-trips through create / retrieve / update / delete
//! - Integrity checking and purge-on-damage
//! - Block reconstruction

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::parity;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn open_store(root: &Path, num_blocks: usize) -> Storage {
        Storage::open(root, "block", num_blocks).unwrap()
    }

    fn fragment(store: &Storage, block: usize, name: &str) -> Vec<u8> {
        fs::read(store.block_path(block).join(name)).unwrap()
    }

    fn stripe(store: &Storage, name: &str) -> Vec<Vec<u8>> {
        (0..store.num_blocks())
            .map(|block| fragment(store, block, name))
            .collect()
    }

    #[test]
    fn test_open_creates_block_directories() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(temp_dir.path(), 3);

        for block in 0..3 {
            assert!(store.block_path(block).is_dir());
            assert_eq!(
                store.block_path(block),
                temp_dir.path().join(format!("block-{block}"))
            );
        }
    }

    #[test]
    fn test_open_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        open_store(temp_dir.path(), 3);
        open_store(temp_dir.path(), 3);
    }

    #[test]
    fn test_open_rejects_narrow_stripe() {
        let temp_dir = TempDir::new().unwrap();
        assert!(Storage::open(temp_dir.path(), "block", 2).is_err());
    }

    #[test]
    fn test_create_even_payload_splits_without_padding() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(temp_dir.path(), 3);

        store.create_file("a", Some("text/plain"), b"ABCD").unwrap();

        assert_eq!(fragment(&store, 0, "a"), b"AB");
        assert_eq!(fragment(&store, 1, "a"), b"CD");
        assert_eq!(fragment(&store, 2, "a"), vec![0x02, 0x06]);
        assert_eq!(store.retrieve_file("a").unwrap(), b"ABCD");
    }

    #[test]
    fn test_create_odd_payload_pads_short_segment() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(temp_dir.path(), 3);

        store.create_file("b", Some("text/plain"), b"ABCDE").unwrap();

        assert_eq!(fragment(&store, 0, "b"), b"ABC");
        assert_eq!(fragment(&store, 1, "b"), b"DE\x00");
        assert_eq!(fragment(&store, 2, "b"), vec![0x05, 0x07, 0x43]);
        assert_eq!(store.retrieve_file("b").unwrap(), b"ABCDE");
    }

    #[test]
    fn test_create_single_byte_payload() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(temp_dir.path(), 3);

        store.create_file("c", Some("text/plain"), b"X").unwrap();

        assert_eq!(fragment(&store, 0, "c"), b"X");
        assert_eq!(fragment(&store, 1, "c"), b"\x00");
        assert_eq!(fragment(&store, 2, "c"), b"X");
        assert_eq!(store.retrieve_file("c").unwrap(), b"X");
    }

    #[test]
    fn test_create_empty_payload() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(temp_dir.path(), 3);

        store.create_file("empty", None, b"").unwrap();

        assert!(store.is_intact("empty").unwrap());
        assert_eq!(store.retrieve_file("empty").unwrap(), b"");
    }

    #[test]
    fn test_descriptor_reports_size_checksum_and_content() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(temp_dir.path(), 3);

        let descriptor = store
            .create_file("greeting.txt", Some("text/plain"), b"hello world")
            .unwrap();

        assert_eq!(descriptor.name, "greeting.txt");
        assert_eq!(descriptor.size, 11);
        assert_eq!(descriptor.checksum, "5eb63bbbe01eeed093cb22bb8f5acdc3");
        assert_eq!(descriptor.content, "hello world");
        assert_eq!(descriptor.content_type, "text/plain");
    }

    #[test]
    fn test_descriptor_defaults_content_type() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(temp_dir.path(), 3);

        let descriptor = store.create_file("a", None, b"AB").unwrap();
        assert_eq!(descriptor.content_type, "application/octet-stream");
    }

    #[test]
    fn test_stripe_is_intact_after_create() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(temp_dir.path(), 3);

        store.create_file("a", None, b"some text payload").unwrap();
        assert!(store.is_intact("a").unwrap());
    }

    #[test]
    fn test_parity_law_holds_across_fragments() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(temp_dir.path(), 3);

        store.create_file("a", None, b"parity law payload").unwrap();
        assert!(parity::verify(&stripe(&store, "a")));
    }

    #[test]
    fn test_round_trip_various_lengths() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(temp_dir.path(), 3);

        for (name, len) in [("r1", 1), ("r2", 2), ("r3", 3), ("r64", 64), ("r65", 65)] {
            let payload: Vec<u8> = (0..len).map(|i| b'a' + (i % 26) as u8).collect();
            store.create_file(name, None, &payload).unwrap();
            assert_eq!(store.retrieve_file(name).unwrap(), payload, "payload {name}");
            assert!(store.is_intact(name).unwrap());
        }
    }

    #[test]
    fn test_wider_stripe_keeps_fragments_equal_and_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(temp_dir.path(), 5);

        // 11 bytes over 4 data blocks: d=2, m=3, so one segment is padded.
        let payload = b"hello world";
        store.create_file("w", None, payload).unwrap();

        let fragments = stripe(&store, "w");
        assert!(fragments.iter().all(|f| f.len() == fragments[0].len()));
        assert!(parity::verify(&fragments));
        assert!(store.is_intact("w").unwrap());
        assert_eq!(store.retrieve_file("w").unwrap(), payload);
    }

    #[test]
    fn test_update_replaces_content() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(temp_dir.path(), 3);

        store.create_file("a", Some("text/plain"), b"ABCD").unwrap();
        store.update_file("a", Some("text/plain"), b"ZZZZ").unwrap();

        assert_eq!(store.retrieve_file("a").unwrap(), b"ZZZZ");
        assert!(store.is_intact("a").unwrap());
    }

    #[test]
    fn test_delete_removes_every_fragment() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(temp_dir.path(), 3);

        store.create_file("a", None, b"ABCD").unwrap();
        store.delete_file("a").unwrap();

        for block in 0..3 {
            assert!(!store.block_path(block).join("a").exists());
        }
    }

    #[test]
    fn test_delete_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(temp_dir.path(), 3);

        store.create_file("a", None, b"ABCD").unwrap();
        store.delete_file("a").unwrap();
        store.delete_file("a").unwrap();
        store.delete_file("never-existed").unwrap();
    }

    #[test]
    fn test_missing_fragment_fails_integrity() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(temp_dir.path(), 3);

        store.create_file("a", None, b"ABCD").unwrap();
        fs::remove_file(store.block_path(1).join("a")).unwrap();

        assert!(!store.is_intact("a").unwrap());
    }

    #[test]
    fn test_size_mismatch_fails_integrity() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(temp_dir.path(), 3);

        store.create_file("a", None, b"ABCD").unwrap();
        fs::write(store.block_path(0).join("a"), b"ABX").unwrap();

        assert!(!store.is_intact("a").unwrap());
    }

    #[test]
    fn test_corrupted_fragment_is_purged() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(temp_dir.path(), 3);

        store.create_file("a", None, b"ABCD").unwrap();

        // Flip one bit in block 1, keeping the fragment length unchanged.
        let path = store.block_path(1).join("a");
        let mut bytes = fs::read(&path).unwrap();
        bytes[0] ^= 0x01;
        fs::write(&path, bytes).unwrap();

        assert!(!store.integrity_or_purge("a").unwrap());
        for block in 0..3 {
            assert!(!store.block_path(block).join("a").exists());
        }
    }

    #[test]
    fn test_intact_stripe_survives_gate() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(temp_dir.path(), 3);

        store.create_file("a", None, b"ABCD").unwrap();
        assert!(store.integrity_or_purge("a").unwrap());
        assert!(store.is_intact("a").unwrap());
    }

    #[test]
    fn test_fix_block_restores_deleted_fragment() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(temp_dir.path(), 3);

        store.create_file("a", None, b"ABCDE").unwrap();
        let original = fragment(&store, 2, "a");

        fs::remove_file(store.block_path(2).join("a")).unwrap();
        store.fix_block(2).unwrap();

        assert_eq!(fragment(&store, 2, "a"), original);
        assert!(store.is_intact("a").unwrap());
    }

    #[test]
    fn test_fix_block_restores_whole_directory() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(temp_dir.path(), 3);

        store.create_file("a", None, b"first file").unwrap();
        store.create_file("b", None, b"second file").unwrap();
        let originals = [fragment(&store, 0, "a"), fragment(&store, 0, "b")];

        fs::remove_dir_all(store.block_path(0)).unwrap();
        store.fix_block(0).unwrap();

        assert_eq!(fragment(&store, 0, "a"), originals[0]);
        assert_eq!(fragment(&store, 0, "b"), originals[1]);
        assert!(store.is_intact("a").unwrap());
        assert!(store.is_intact("b").unwrap());
        assert_eq!(store.retrieve_file("a").unwrap(), b"first file");
        assert_eq!(store.retrieve_file("b").unwrap(), b"second file");
    }

    #[test]
    fn test_fix_block_works_for_any_block() {
        // XOR is symmetric: data blocks and the parity block are rebuilt by
        // the same procedure.
        for lost in 0..3 {
            let temp_dir = TempDir::new().unwrap();
            let store = open_store(temp_dir.path(), 3);

            store.create_file("a", None, b"symmetric repair").unwrap();
            let original = fragment(&store, lost, "a");

            fs::remove_dir_all(store.block_path(lost)).unwrap();
            store.fix_block(lost).unwrap();

            assert_eq!(fragment(&store, lost, "a"), original, "block {lost}");
            assert_eq!(store.retrieve_file("a").unwrap(), b"symmetric repair");
        }
    }

    #[test]
    fn test_fix_block_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(temp_dir.path(), 3);

        store.create_file("a", None, b"ABCDE").unwrap();
        fs::remove_file(store.block_path(1).join("a")).unwrap();

        store.fix_block(1).unwrap();
        let first = fragment(&store, 1, "a");
        store.fix_block(1).unwrap();

        assert_eq!(fragment(&store, 1, "a"), first);
    }

    #[test]
    fn test_fix_block_rejects_out_of_range() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(temp_dir.path(), 3);

        assert!(store.fix_block(3).is_err());
    }

    #[test]
    fn test_health_check_reports_and_purges() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(temp_dir.path(), 3);

        store.create_file("good", None, b"fine payload").unwrap();
        store.create_file("bad", None, b"doomed payload").unwrap();
        fs::remove_file(store.block_path(2).join("bad")).unwrap();

        let report = store.health_check().unwrap();

        assert_eq!(report.total_files, 2);
        assert_eq!(report.intact, 1);
        assert_eq!(report.purged, 1);
        assert!(report.files.contains(&("good".to_string(), true)));
        assert!(report.files.contains(&("bad".to_string(), false)));
        for block in 0..3 {
            assert!(!store.block_path(block).join("bad").exists());
        }
    }
}
