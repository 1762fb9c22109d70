mod common;

use common::*;
use libdfs::report::BlockReporter;
use libdfs::{ClientError, RemoteStore};
use rdfs::commands::namespace::{self, BlockinfoArgs, LsArgs};
use rdfs::commands::transfer::{self, DownloadArgs, UploadArgs};
use rdfs::commands::{StoreArgs, exit_code};
use tempfile::tempdir;

fn download_args(remote: &str, local: std::path::PathBuf) -> DownloadArgs {
    DownloadArgs {
        remote: p(remote),
        local,
        offset: 0,
        length: None,
        chunk_size: 8 * 1024,
        resume: false,
    }
}

fn upload_args(local: std::path::PathBuf, remote: &str) -> UploadArgs {
    UploadArgs {
        local,
        remote: p(remote),
        overwrite: false,
        chunk_size: 8 * 1024,
    }
}

#[tokio::test]
async fn upload_then_download_round_trip() {
    let store_dir = tempdir().unwrap();
    let work_dir = tempdir().unwrap();
    let store = scratch_store(store_dir.path());

    let source = work_dir.path().join("in.bin");
    let data = payload(150_000);
    std::fs::write(&source, &data).unwrap();

    transfer::upload(&store, upload_args(source, "/data/in.bin"))
        .await
        .unwrap();

    let dest = work_dir.path().join("out.bin");
    transfer::download(&store, download_args("/data/in.bin", dest.clone()))
        .await
        .unwrap();

    assert_eq!(std::fs::read(&dest).unwrap(), data);
}

#[tokio::test]
async fn range_download_writes_the_requested_slice() {
    let store_dir = tempdir().unwrap();
    let work_dir = tempdir().unwrap();
    let store = scratch_store(store_dir.path());

    let source = work_dir.path().join("in.bin");
    let data = payload(100_000);
    std::fs::write(&source, &data).unwrap();
    transfer::upload(&store, upload_args(source, "/f"))
        .await
        .unwrap();

    let dest = work_dir.path().join("slice.bin");
    let mut args = download_args("/f", dest.clone());
    args.offset = 1000;
    args.length = Some(5000);
    transfer::download(&store, args).await.unwrap();

    assert_eq!(std::fs::read(&dest).unwrap(), &data[1000..6000]);
}

#[tokio::test]
async fn resume_download_completes_a_partial_file() {
    let store_dir = tempdir().unwrap();
    let work_dir = tempdir().unwrap();
    let store = scratch_store(store_dir.path());

    let source = work_dir.path().join("in.bin");
    let data = payload(100_000);
    std::fs::write(&source, &data).unwrap();
    transfer::upload(&store, upload_args(source, "/f"))
        .await
        .unwrap();

    // A previous run got 30000 bytes down before dying.
    let dest = work_dir.path().join("out.bin");
    std::fs::write(&dest, &data[..30_000]).unwrap();

    let mut args = download_args("/f", dest.clone());
    args.resume = true;
    transfer::download(&store, args).await.unwrap();

    assert_eq!(std::fs::read(&dest).unwrap(), data);
}

#[tokio::test]
async fn resume_of_a_finished_download_adds_nothing() {
    let store_dir = tempdir().unwrap();
    let work_dir = tempdir().unwrap();
    let store = scratch_store(store_dir.path());

    let source = work_dir.path().join("in.bin");
    let data = payload(10_000);
    std::fs::write(&source, &data).unwrap();
    transfer::upload(&store, upload_args(source, "/f"))
        .await
        .unwrap();

    let dest = work_dir.path().join("out.bin");
    std::fs::write(&dest, &data).unwrap();

    let mut args = download_args("/f", dest.clone());
    args.resume = true;
    transfer::download(&store, args).await.unwrap();

    assert_eq!(std::fs::read(&dest).unwrap(), data);
}

#[tokio::test]
async fn download_of_missing_remote_creates_no_local_file() {
    let store_dir = tempdir().unwrap();
    let work_dir = tempdir().unwrap();
    let store = scratch_store(store_dir.path());

    let dest = work_dir.path().join("out.bin");
    let err = transfer::download(&store, download_args("/nope", dest.clone()))
        .await
        .unwrap_err();

    assert_eq!(exit_code(&err), 1);
    assert!(!dest.exists());
}

#[tokio::test]
async fn upload_without_overwrite_is_refused() {
    let store_dir = tempdir().unwrap();
    let work_dir = tempdir().unwrap();
    let store = scratch_store(store_dir.path());

    let source = work_dir.path().join("in.bin");
    std::fs::write(&source, payload(5000)).unwrap();
    transfer::upload(&store, upload_args(source.clone(), "/f"))
        .await
        .unwrap();

    let err = transfer::upload(&store, upload_args(source.clone(), "/f"))
        .await
        .unwrap_err();
    assert_eq!(exit_code(&err), 1);

    // The replacement payload lands once --overwrite is given.
    let replacement = payload(700);
    std::fs::write(&source, &replacement).unwrap();
    let mut args = upload_args(source, "/f");
    args.overwrite = true;
    transfer::upload(&store, args).await.unwrap();

    let status = store.status(&p("/f")).await.unwrap();
    assert_eq!(status.size, 700);
}

#[tokio::test]
async fn mkdir_mv_rm_flow() {
    let store_dir = tempdir().unwrap();
    let work_dir = tempdir().unwrap();
    let store = scratch_store(store_dir.path());

    namespace::mkdir(&store, &p("/a/b")).await.unwrap();

    let source = work_dir.path().join("f.bin");
    std::fs::write(&source, payload(100)).unwrap();
    transfer::upload(&store, upload_args(source, "/a/b/f.bin"))
        .await
        .unwrap();

    namespace::mv(&store, &p("/a/b/f.bin"), &p("/a/b/g.bin"))
        .await
        .unwrap();
    assert!(store.status(&p("/a/b/g.bin")).await.is_ok());
    assert!(matches!(
        store.status(&p("/a/b/f.bin")).await,
        Err(ClientError::NotFound(_))
    ));

    // Deleting a non-empty directory needs -r; that refusal is a usage error.
    let err = namespace::rm(&store, &p("/a"), false).await.unwrap_err();
    assert_eq!(exit_code(&err), 2);

    namespace::rm(&store, &p("/a"), true).await.unwrap();
    assert!(matches!(
        store.status(&p("/a")).await,
        Err(ClientError::NotFound(_))
    ));
}

#[tokio::test]
async fn mv_of_missing_source_exits_with_one() {
    let store_dir = tempdir().unwrap();
    let store = scratch_store(store_dir.path());

    let err = namespace::mv(&store, &p("/missing"), &p("/x"))
        .await
        .unwrap_err();
    assert_eq!(exit_code(&err), 1);
}

#[tokio::test]
async fn ls_commands_run_against_a_populated_tree() {
    let store_dir = tempdir().unwrap();
    let work_dir = tempdir().unwrap();
    let store = scratch_store(store_dir.path());

    namespace::mkdir(&store, &p("/docs/nested")).await.unwrap();
    let source = work_dir.path().join("f.bin");
    std::fs::write(&source, payload(100)).unwrap();
    transfer::upload(&store, upload_args(source, "/docs/nested/f.bin"))
        .await
        .unwrap();

    namespace::ls(
        &store,
        LsArgs {
            path: p("/"),
            recursive: true,
            fail_fast: false,
            json: false,
        },
    )
    .await
    .unwrap();

    namespace::ls(
        &store,
        LsArgs {
            path: p("/docs"),
            recursive: false,
            fail_fast: false,
            json: true,
        },
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn blockinfo_on_a_directory_fails() {
    let store_dir = tempdir().unwrap();
    let store = scratch_store(store_dir.path());
    namespace::mkdir(&store, &p("/d")).await.unwrap();

    let err = namespace::blockinfo(
        &store,
        BlockinfoArgs {
            path: p("/d"),
            json: false,
        },
    )
    .await
    .unwrap_err();
    assert_eq!(exit_code(&err), 1);
}

#[tokio::test]
async fn store_args_layout_flows_into_block_reports() {
    let store_dir = tempdir().unwrap();
    let work_dir = tempdir().unwrap();
    let args = StoreArgs {
        store_root: store_dir.path().into(),
        block_size: 1024,
        replication: 2,
    };
    let store = args.open_store();

    let source = work_dir.path().join("f.bin");
    std::fs::write(&source, payload(2500)).unwrap();
    transfer::upload(&store, upload_args(source, "/f"))
        .await
        .unwrap();

    let report = BlockReporter::new(&store).report(&p("/f")).await.unwrap();
    assert_eq!(report.block_size, 1024);
    assert_eq!(report.replication, 2);
    assert_eq!(report.blocks.len(), 3);
    assert!(report.blocks.iter().all(|b| b.hosts.len() == 2));
}
