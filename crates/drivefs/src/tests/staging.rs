use super::new_fs;
use crate::error::Error;
use crate::staged::OpenOptions;
use chrono::{TimeZone, Utc};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::time::Duration;

/// Lets the clock move past the millisecond of the previous write.
async fn tick() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}

#[tokio::test]
async fn test_append_and_update_in_place() {
    let (fs, _backend) = new_fs();
    fs.write_bytes("/f.txt", b"AAA").await.unwrap();

    let mut file = fs.open("/f.txt", "a").await.unwrap();
    file.write_all(b"BBB").unwrap();
    file.close().await.unwrap();
    assert_eq!(fs.read_bytes("/f.txt").await.unwrap(), b"AAABBB");

    let mut file = fs.open("/f.txt", "r+").await.unwrap();
    file.seek(SeekFrom::Start(1)).unwrap();
    file.write_all(b"X").unwrap();
    file.close().await.unwrap();
    assert_eq!(fs.read_bytes("/f.txt").await.unwrap(), b"AXABBB");
}

#[tokio::test]
async fn test_append_writes_go_to_the_end() {
    let (fs, _backend) = new_fs();
    fs.write_bytes("/log.txt", b"one\n").await.unwrap();

    let mut file = fs.open("/log.txt", "a+").await.unwrap();
    file.seek(SeekFrom::Start(0)).unwrap();
    let mut head = [0u8; 3];
    file.read_exact(&mut head).unwrap();
    assert_eq!(&head, b"one");
    file.write_all(b"two\n").unwrap();
    file.close().await.unwrap();

    assert_eq!(fs.read_bytes("/log.txt").await.unwrap(), b"one\ntwo\n");
}

#[tokio::test]
async fn test_truncating_write_replaces_content() {
    let (fs, _backend) = new_fs();
    fs.write_bytes("/f.bin", b"a long first version").await.unwrap();
    let id = fs.getinfo("/f.bin").await.unwrap().id().to_string();

    fs.write_bytes("/f.bin", b"short").await.unwrap();
    let info = fs.getinfo("/f.bin").await.unwrap();
    assert_eq!(fs.read_bytes("/f.bin").await.unwrap(), b"short");
    assert_eq!(info.size(), Some(5));
    // content replaced in place, not a new object
    assert_eq!(info.id(), id);
    assert_eq!(fs.listdir("/").await.unwrap(), vec!["f.bin".to_string()]);
}

#[tokio::test]
async fn test_created_stable_modified_increases() {
    let (fs, _backend) = new_fs();
    fs.write_bytes("/t.txt", b"first").await.unwrap();
    let before = fs.getinfo("/t.txt").await.unwrap();

    tick().await;
    let mut file = fs.open("/t.txt", "a").await.unwrap();
    file.write_all(b" second").unwrap();
    file.close().await.unwrap();
    let after = fs.getinfo("/t.txt").await.unwrap();

    assert!(before.created().is_some());
    assert_eq!(after.created(), before.created());
    assert!(after.modified() > before.modified());
}

#[tokio::test]
async fn test_created_time_option() {
    let (fs, _backend) = new_fs();
    let created = Utc.with_ymd_and_hms(2019, 6, 1, 12, 0, 0).unwrap();
    let mut file = fs
        .openbin("/old.txt", "w", OpenOptions::default().created_time(created))
        .await
        .unwrap();
    file.write_all(b"x").unwrap();
    file.close().await.unwrap();

    let info = fs.getinfo("/old.txt").await.unwrap();
    assert_eq!(info.created(), Some(created));
    assert!(info.modified() > Some(created));
}

#[tokio::test]
async fn test_zero_byte_file() {
    let (fs, backend) = new_fs();
    let file = fs.open("/empty.dat", "w").await.unwrap();
    file.close().await.unwrap();

    let info = fs.getinfo("/empty.dat").await.unwrap();
    assert!(info.is_file());
    assert_eq!(info.size(), Some(0));
    assert_eq!(info.md5(), Some("d41d8cd98f00b204e9800998ecf8427e"));
    assert!(fs.read_bytes("/empty.dat").await.unwrap().is_empty());
    assert_eq!(backend.calls().await.uploads, 1);
}

#[tokio::test]
async fn test_read_only_handle_does_not_upload() {
    let (fs, backend) = new_fs();
    fs.write_bytes("/r.txt", b"data").await.unwrap();
    let uploads = backend.calls().await.uploads;

    let mut file = fs.open("/r.txt", "r").await.unwrap();
    let mut content = String::new();
    file.read_to_string(&mut content).unwrap();
    assert_eq!(content, "data");
    let err = file.write(b"nope").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    file.close().await.unwrap();

    assert_eq!(backend.calls().await.uploads, uploads);
}

#[tokio::test]
async fn test_write_only_handle_cannot_read() {
    let (fs, _backend) = new_fs();
    let mut file = fs.open("/w.txt", "w").await.unwrap();
    let mut buf = [0u8; 4];
    let err = file.read(&mut buf).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    file.close().await.unwrap();
}

#[tokio::test]
async fn test_scratch_file_removed_after_close() {
    let (fs, _backend) = new_fs();
    let mut file = fs.open("/report.csv", "w").await.unwrap();
    let local = file.local_path().unwrap().to_path_buf();
    assert!(local.exists());
    assert!(local.to_string_lossy().ends_with(".csv"));
    let name = local.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("drivefs-"));

    file.write_all(b"a,b\n").unwrap();
    file.close().await.unwrap();
    assert!(!local.exists());
}

#[tokio::test]
async fn test_scratch_file_removed_after_failed_upload() {
    let (fs, backend) = new_fs();
    backend.set_fail_uploads(true).await;

    let mut file = fs.open("/lost.txt", "w").await.unwrap();
    let local = file.local_path().unwrap().to_path_buf();
    file.write_all(b"content").unwrap();
    let err = file.close().await.unwrap_err();

    assert!(matches!(err, Error::OperationFailed { ref path, .. } if path == "/lost.txt"));
    assert!(!local.exists());
    assert!(!fs.exists("/lost.txt").await.unwrap());
}

#[tokio::test]
async fn test_dropped_handle_discards_changes() {
    let (fs, _backend) = new_fs();
    fs.write_bytes("/keep.txt", b"original").await.unwrap();

    let mut file = fs.open("/keep.txt", "w").await.unwrap();
    let local = file.local_path().unwrap().to_path_buf();
    file.write_all(b"changed").unwrap();
    drop(file);

    assert!(!local.exists());
    assert_eq!(fs.read_bytes("/keep.txt").await.unwrap(), b"original");
}

#[tokio::test]
async fn test_multi_chunk_upload() {
    let (fs, backend) = new_fs();
    backend.set_chunk_size(1000).await;
    let content: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();

    fs.write_bytes("/big.bin", &content).await.unwrap();
    assert_eq!(fs.read_bytes("/big.bin").await.unwrap(), content);
    assert_eq!(fs.getinfo("/big.bin").await.unwrap().size(), Some(10_000));
}

#[tokio::test]
async fn test_open_mode_matrix() {
    let (fs, _backend) = new_fs();
    fs.makedir("/dir", false).await.unwrap();
    fs.write_bytes("/dir/f.txt", b"x").await.unwrap();

    assert!(matches!(fs.open("/missing.txt", "r").await, Err(Error::NotFound(_))));
    assert!(matches!(fs.open("/missing.txt", "r+").await, Err(Error::NotFound(_))));
    assert!(matches!(fs.open("/dir", "r").await, Err(Error::FileExpected(_))));
    assert!(matches!(fs.open("/dir", "w").await, Err(Error::FileExpected(_))));
    assert!(matches!(fs.open("/", "w").await, Err(Error::FileExpected(_))));
    assert!(matches!(fs.open("/dir/f.txt", "x").await, Err(Error::FileExists(_))));
    assert!(matches!(fs.open("/nodir/f.txt", "w").await, Err(Error::NotFound(p)) if p == "/nodir"));
    assert!(matches!(
        fs.open("/dir/f.txt/inner", "w").await,
        Err(Error::DirectoryExpected(_))
    ));
    assert!(matches!(fs.open("/dir/f.txt", "rw").await, Err(Error::InvalidMode(_))));
    assert!(matches!(fs.open("/dir/f.txt", "q").await, Err(Error::InvalidMode(_))));

    let file = fs.open("/dir/new.txt", "x").await.unwrap();
    file.close().await.unwrap();
    assert!(fs.isfile("/dir/new.txt").await.unwrap());
}

#[tokio::test]
async fn test_concurrent_writers() {
    let (fs, _backend) = new_fs();
    fs.makedir("/out", false).await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..8 {
        let fs = fs.clone();
        tasks.push(tokio::spawn(async move {
            let path = format!("/out/part-{i}.txt");
            let body = format!("part {i}");
            fs.write_bytes(&path, body.as_bytes()).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let mut names = fs.listdir("/out").await.unwrap();
    names.sort();
    assert_eq!(names.len(), 8);
    assert_eq!(names[0], "part-0.txt");
    assert_eq!(fs.read_bytes("/out/part-7.txt").await.unwrap(), b"part 7");
}
