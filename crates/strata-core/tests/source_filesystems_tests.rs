//! End-to-end tests for the component filesystem builder: overlay
//! shadowing, language-partitioned content, strict-ordered data roots and
//! static dir composition.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use strata_core::error::Error;
use strata_core::modules::{Client, ClientConfig, Import, ModuleConfig, Mount};
use strata_core::sourcefs::{BaseFs, PROJECT_VIRTUAL_FOLDER};
use strata_core::Paths;
use strata_types::Language;

static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

fn temp_project() -> PathBuf {
    let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    env::temp_dir().join(format!("strata-basefs-test-{}-{}", std::process::id(), id))
}

async fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.unwrap();
    }
    tokio::fs::write(path, contents).await.unwrap();
}

async fn cleanup(dir: &Path) {
    let _ = tokio::fs::remove_dir_all(dir).await;
}

async fn build(dir: &Path, paths: &Paths, module_config: ModuleConfig) -> BaseFs {
    let mut client = Client::new(ClientConfig {
        working_dir: dir.to_path_buf(),
        themes_dir: dir.join("themes"),
        ignore_vendor: false,
        mod_proxy: None,
        module_config,
    });
    let mc = client.collect().await.unwrap();
    BaseFs::build(paths, &mc.modules).await.unwrap()
}

fn imports(paths: &[&str]) -> ModuleConfig {
    ModuleConfig {
        imports: paths.iter().map(|p| Import::new(*p)).collect(),
    }
}

// ============================================================================
// Layouts, archetypes, assets: project over modules, first module wins
// ============================================================================

#[tokio::test]
async fn project_layout_shadows_modules() {
    let dir = temp_project();
    write_file(&dir.join("layouts/index.html"), "project").await;
    write_file(&dir.join("themes/a/layouts/index.html"), "theme a").await;
    write_file(&dir.join("themes/b/layouts/index.html"), "theme b").await;
    write_file(&dir.join("themes/b/layouts/only-b.html"), "only b").await;

    let base = build(&dir, &Paths::new(&dir), imports(&["a", "b"])).await;
    let layouts = &base.sources.layouts;

    assert_eq!(
        layouts.fs.read(Path::new("index.html")).await.unwrap(),
        b"project"
    );
    assert_eq!(
        layouts.fs.read(Path::new("only-b.html")).await.unwrap(),
        b"only b"
    );

    cleanup(&dir).await;
}

#[tokio::test]
async fn first_declared_module_wins_without_project_file() {
    let dir = temp_project();
    write_file(&dir.join("themes/a/layouts/index.html"), "theme a").await;
    write_file(&dir.join("themes/b/layouts/index.html"), "theme b").await;

    let base = build(&dir, &Paths::new(&dir), imports(&["a", "b"])).await;

    assert_eq!(
        base.sources.layouts.fs.read(Path::new("index.html")).await.unwrap(),
        b"theme a"
    );

    cleanup(&dir).await;
}

#[tokio::test]
async fn assets_come_from_module_when_project_has_none() {
    let dir = temp_project();
    tokio::fs::create_dir_all(&dir).await.unwrap();
    write_file(&dir.join("themes/a/assets/scss/main.scss"), "body {}").await;

    let base = build(&dir, &Paths::new(&dir), imports(&["a"])).await;

    let info = base
        .sources
        .assets
        .fs
        .stat(Path::new("scss/main.scss"))
        .await
        .unwrap();
    assert!(info.is_file());
    // Real-filename round-trip: the decorated filename is absolute and
    // resolves on disk.
    let real = info.meta.filename.unwrap();
    assert!(real.is_absolute());
    assert_eq!(tokio::fs::read(&real).await.unwrap(), b"body {}");

    cleanup(&dir).await;
}

#[tokio::test]
async fn writes_rejected_on_read_only_components() {
    let dir = temp_project();
    write_file(&dir.join("layouts/index.html"), "project").await;
    write_file(&dir.join("themes/a/layouts/l.html"), "a").await;

    let base = build(&dir, &Paths::new(&dir), imports(&["a"])).await;

    let err = base
        .sources
        .layouts
        .fs
        .write(Path::new("new.html"), b"x")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::PermissionDenied);

    cleanup(&dir).await;
}

#[tokio::test]
async fn resources_writable_at_project_layer() {
    let dir = temp_project();
    write_file(&dir.join("themes/a/layouts/l.html"), "a").await;

    let base = build(&dir, &Paths::new(&dir), imports(&["a"])).await;
    let resources = &base.sources.resources;

    resources
        .fs
        .write(Path::new("_gen/images/x.json"), b"{}")
        .await
        .unwrap();

    // The write landed below the project's resources dir.
    assert_eq!(
        tokio::fs::read(dir.join("resources/_gen/images/x.json"))
            .await
            .unwrap(),
        b"{}"
    );

    cleanup(&dir).await;
}

// ============================================================================
// Content: language-partitioned mounts
// ============================================================================

#[tokio::test]
async fn content_mounts_partition_by_language() {
    let dir = temp_project();
    write_file(&dir.join("themes/a/myacontent/page.md"), "Content A").await;
    write_file(&dir.join("themes/b/mybcontent/page.md"), "Content B").await;

    let module_config = ModuleConfig {
        imports: vec![
            Import {
                path: "a".to_string(),
                mounts: vec![Mount::new("myacontent", "content/blog").with_lang("en")],
            },
            Import {
                path: "b".to_string(),
                mounts: vec![Mount::new("mybcontent", "content/blog").with_lang("nn")],
            },
        ],
    };

    let mut paths = Paths::new(&dir);
    paths.default_content_language = "en".to_string();
    paths.languages = vec![
        Language::new("en").with_content_dir("content"),
        Language::new("nn"),
    ];

    let base = build(&dir, &paths, module_config).await;
    let content = &base.sources.content;

    let entries = content.fs.read_dir(Path::new("blog")).await.unwrap();
    assert_eq!(entries.len(), 2);

    let en = &entries[0];
    assert_eq!(en.name(), "page.md");
    assert_eq!(en.meta.lang.as_deref(), Some("en"));
    assert_eq!(en.meta.open().await.unwrap(), b"Content A");

    let nn = &entries[1];
    assert_eq!(nn.name(), "page.md");
    assert_eq!(nn.meta.lang.as_deref(), Some("nn"));
    assert_eq!(nn.meta.open().await.unwrap(), b"Content B");

    cleanup(&dir).await;
}

#[tokio::test]
async fn untagged_content_mount_gets_default_language() {
    let dir = temp_project();
    write_file(&dir.join("themes/a/mycontent/post.md"), "post").await;

    let module_config = ModuleConfig {
        imports: vec![Import {
            path: "a".to_string(),
            mounts: vec![Mount::new("mycontent", "content")],
        }],
    };

    let mut paths = Paths::new(&dir);
    paths.default_content_language = "en".to_string();

    let base = build(&dir, &paths, module_config).await;

    let entries = base.sources.content.fs.read_dir(Path::new("")).await.unwrap();
    let post = entries.iter().find(|e| e.name() == "post.md").unwrap();
    assert_eq!(post.meta.lang.as_deref(), Some("en"));

    cleanup(&dir).await;
}

#[tokio::test]
async fn project_content_shadows_module_content() {
    let dir = temp_project();
    write_file(&dir.join("content/post.en.md"), "project post").await;
    write_file(&dir.join("themes/a/mycontent/post.en.md"), "module post").await;

    let module_config = ModuleConfig {
        imports: vec![Import {
            path: "a".to_string(),
            mounts: vec![Mount::new("mycontent", "content")],
        }],
    };

    let base = build(&dir, &Paths::new(&dir), module_config).await;

    let entries = base.sources.content.fs.read_dir(Path::new("")).await.unwrap();
    let posts: Vec<_> = entries.iter().filter(|e| e.name() == "post.en.md").collect();
    // Both carry weight 2 for the en layer; the project provider comes
    // first and wins the tie.
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].meta.open().await.unwrap(), b"project post");

    cleanup(&dir).await;
}

#[tokio::test]
async fn overlapping_content_dirs_fail_the_build() {
    let dir = temp_project();
    tokio::fs::create_dir_all(&dir).await.unwrap();

    let mut paths = Paths::new(&dir);
    paths.languages = vec![
        Language::new("en").with_content_dir("content"),
        Language::new("sv").with_content_dir("content/sv"),
    ];

    let err = BaseFs::build(&paths, &[]).await.unwrap_err();
    assert!(matches!(err, Error::OverlappingContentDirs(..)), "{err}");

    cleanup(&dir).await;
}

// ============================================================================
// Data and i18n: strict order, distinct subtrees
// ============================================================================

#[tokio::test]
async fn data_roots_are_distinct_subtrees() {
    let dir = temp_project();
    write_file(&dir.join("data/site.toml"), "x = 1\n").await;
    write_file(&dir.join("themes/a/data/mod.toml"), "y = 2\n").await;

    let base = build(&dir, &Paths::new(&dir), imports(&["a"])).await;
    let data = &base.sources.data;

    let roots: Vec<String> = data
        .fs
        .read_dir(Path::new("/"))
        .await
        .unwrap()
        .iter()
        .map(|e| e.name().to_string())
        .collect();
    assert_eq!(roots, vec![PROJECT_VIRTUAL_FOLDER.to_string(), "a".to_string()]);

    let project_file = format!("{PROJECT_VIRTUAL_FOLDER}/site.toml");
    assert_eq!(
        data.fs.read(Path::new(&project_file)).await.unwrap(),
        b"x = 1\n"
    );
    assert_eq!(data.fs.read(Path::new("a/mod.toml")).await.unwrap(), b"y = 2\n");

    cleanup(&dir).await;
}

#[tokio::test]
async fn missing_dir_config_key_fails() {
    let dir = temp_project();
    tokio::fs::create_dir_all(&dir).await.unwrap();

    let mut paths = Paths::new(&dir);
    paths.data_dir = String::new();

    let err = BaseFs::build(&paths, &[]).await.unwrap_err();
    assert!(err.to_string().contains("\"data_dir\" not set"), "{err}");

    cleanup(&dir).await;
}

// ============================================================================
// Static
// ============================================================================

#[tokio::test]
async fn static_rightmost_dir_wins() {
    let dir = temp_project();
    write_file(&dir.join("static1/f.txt"), "one").await;
    write_file(&dir.join("static2/f.txt"), "two").await;
    write_file(&dir.join("static1/only1.txt"), "only").await;

    let mut paths = Paths::new(&dir);
    paths.languages = vec![Language::new("en")
        .with_content_dir("content")
        .with_static_dir("static1")
        .with_static_dir("static2")];

    let base = build(&dir, &paths, ModuleConfig::default()).await;
    let statics = &base.sources.statics;

    let fs = &statics.get("").expect("one shared static fs").fs;
    assert_eq!(fs.read(Path::new("f.txt")).await.unwrap(), b"two");
    assert_eq!(fs.read(Path::new("only1.txt")).await.unwrap(), b"only");

    cleanup(&dir).await;
}

#[tokio::test]
async fn static_project_over_module() {
    let dir = temp_project();
    write_file(&dir.join("static/robots.txt"), "project").await;
    write_file(&dir.join("themes/a/static/robots.txt"), "module").await;
    write_file(&dir.join("themes/a/static/favicon.ico"), "icon").await;

    let mut paths = Paths::new(&dir);
    paths.languages = vec![Language::new("en")
        .with_content_dir("content")
        .with_static_dir("static")];

    let base = build(&dir, &paths, imports(&["a"])).await;

    let fs = base.sources.static_fs("en");
    assert_eq!(fs.read(Path::new("robots.txt")).await.unwrap(), b"project");
    assert_eq!(fs.read(Path::new("favicon.ico")).await.unwrap(), b"icon");

    cleanup(&dir).await;
}

#[tokio::test]
async fn multihost_static_per_language() {
    let dir = temp_project();
    write_file(&dir.join("static_en/en.txt"), "en").await;
    write_file(&dir.join("static_nn/nn.txt"), "nn").await;

    let mut paths = Paths::new(&dir);
    paths.multihost = true;
    paths.languages = vec![
        Language::new("en")
            .with_content_dir("content")
            .with_static_dir("static_en"),
        Language::new("nn").with_static_dir("static_nn"),
    ];

    let base = build(&dir, &paths, ModuleConfig::default()).await;
    let statics = &base.sources.statics;

    assert_eq!(statics.len(), 2);
    assert_eq!(
        statics.get("en").unwrap().publish_folder.as_deref(),
        Some("en")
    );
    assert!(statics
        .get("en")
        .unwrap()
        .fs
        .read(Path::new("en.txt"))
        .await
        .is_ok());
    assert!(statics
        .get("nn")
        .unwrap()
        .fs
        .read(Path::new("en.txt"))
        .await
        .is_err());

    cleanup(&dir).await;
}

// ============================================================================
// Cross-component helpers
// ============================================================================

#[tokio::test]
async fn contains_and_rel_content_dir() {
    let dir = temp_project();
    write_file(&dir.join("content/blog/post.md"), "post").await;
    write_file(&dir.join("layouts/index.html"), "layout").await;

    let base = build(&dir, &Paths::new(&dir), ModuleConfig::default()).await;

    let post_abs = dir.join("content/blog/post.md");
    assert!(base.sources.is_content(&post_abs));
    assert!(!base.sources.is_layout(&post_abs));
    assert_eq!(
        base.rel_content_dir(&post_abs),
        PathBuf::from("blog/post.md")
    );

    let layout_abs = dir.join("layouts/index.html");
    assert!(base.sources.is_layout(&layout_abs));

    cleanup(&dir).await;
}

#[tokio::test]
async fn stat_resource_checks_static_assets_content() {
    let dir = temp_project();
    write_file(&dir.join("static/logo.png"), "static png").await;
    write_file(&dir.join("assets/logo.png"), "asset png").await;
    write_file(&dir.join("assets/style.scss"), "scss").await;

    let mut paths = Paths::new(&dir);
    paths.languages = vec![Language::new("en")
        .with_content_dir("content")
        .with_static_dir("static")];

    let base = build(&dir, &paths, ModuleConfig::default()).await;

    // Static wins over assets for the same name.
    let (info, _) = base
        .sources
        .stat_resource("en", Path::new("logo.png"))
        .await
        .unwrap();
    assert_eq!(
        info.meta.filename,
        Some(dir.join("static/logo.png"))
    );

    let (info, _) = base
        .sources
        .stat_resource("en", Path::new("style.scss"))
        .await
        .unwrap();
    assert_eq!(info.meta.filename, Some(dir.join("assets/style.scss")));

    assert!(base
        .sources
        .stat_resource("en", Path::new("missing.txt"))
        .await
        .is_err());

    cleanup(&dir).await;
}
