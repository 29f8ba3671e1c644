use crate::app_state::{AppState, SharedAppState};
use crate::auth::{Identity, IdentityProvider};
use crate::cli::CommandLineArgs;
use crate::error::GatewayError;
use crate::models::{DType, DataRequest};
use crate::resolver::{DataReference, DatasetResolver, ResolvedHandle};
use crate::snapshot::{self, FieldData};

use async_trait::async_trait;
use hashbrown::HashMap;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;
use zerocopy::AsBytes;

pub(crate) const TEST_USER: &str = "scientist";
pub(crate) const TEST_PASSWORD: &str = "correct-horse-battery";
pub(crate) const TEST_SECRET: &str = "test-signing-secret";

/// A uniquely named temporary directory, removed on drop.
pub(crate) struct TempDir {
    path: PathBuf,
}

impl TempDir {
    pub(crate) fn new() -> Self {
        let path = std::env::temp_dir().join(format!("snapgate-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&path).unwrap();
        TempDir { path }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

/// Identity provider with a single known credential pair.
#[derive(Default)]
pub(crate) struct StaticIdentityProvider {}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Identity, GatewayError> {
        if username == TEST_USER && password == TEST_PASSWORD {
            Ok(Identity {
                username: username.to_string(),
            })
        } else {
            Err(GatewayError::InvalidCredentials)
        }
    }
}

/// Identity provider that is always unreachable.
pub(crate) struct UnavailableIdentityProvider {}

#[async_trait]
impl IdentityProvider for UnavailableIdentityProvider {
    async fn authenticate(
        &self,
        _username: &str,
        _password: &str,
    ) -> Result<Identity, GatewayError> {
        Err(GatewayError::UpstreamUnavailable { status: 503 })
    }
}

/// Write a small snapshot with a 1-D density field and a 2-D coordinates field.
pub(crate) fn write_test_snapshot(path: &Path) {
    let mut units = BTreeMap::new();
    units.insert("length".to_string(), "3.085678e24 cm".to_string());
    units.insert("mass".to_string(), "1.98841e43 g".to_string());
    let fields = vec![
        FieldData {
            name: "density".to_string(),
            dtype: DType::Float64,
            shape: vec![3],
            units: Some("g/cm**3".to_string()),
            columns: None,
            data: [10.0_f64, 20.0, 30.0].as_bytes().to_vec(),
        },
        FieldData {
            name: "coordinates".to_string(),
            dtype: DType::Float64,
            shape: vec![3, 3],
            units: Some("Mpc".to_string()),
            columns: Some(vec!["x".to_string(), "y".to_string(), "z".to_string()]),
            data: [1.0_f64, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]
                .as_bytes()
                .to_vec(),
        },
        FieldData {
            name: "particle_ids".to_string(),
            dtype: DType::Uint64,
            shape: vec![3],
            units: None,
            columns: None,
            data: [2_u64, 0, 1].as_bytes().to_vec(),
        },
    ];
    snapshot::write_snapshot(path, &units, &fields).unwrap();
}

/// Resolve an arbitrary path through a resolver rooted at its parent directory.
pub(crate) fn handle_for(path: &Path) -> ResolvedHandle {
    let root = path.parent().unwrap();
    let resolver = DatasetResolver::new(root, HashMap::new()).unwrap();
    resolver
        .resolve(&DataReference::Path(
            path.file_name().unwrap().to_str().unwrap().to_string(),
        ))
        .unwrap()
}

/// A temporary data root holding the test snapshot, registered under the alias `demo`.
pub(crate) struct SnapshotFixture {
    dir: TempDir,
}

impl SnapshotFixture {
    pub(crate) fn new() -> Self {
        let dir = TempDir::new();
        write_test_snapshot(&dir.path().join("snap.psf"));
        std::fs::write(dir.path().join("aliases.json"), r#"{"demo": "snap.psf"}"#).unwrap();
        SnapshotFixture { dir }
    }

    pub(crate) fn resolver(&self) -> DatasetResolver {
        let mut aliases = HashMap::new();
        aliases.insert("demo".to_string(), PathBuf::from("snap.psf"));
        DatasetResolver::new(self.dir.path(), aliases).unwrap()
    }

    pub(crate) fn handle(&self) -> ResolvedHandle {
        self.resolver()
            .resolve(&DataReference::Alias("demo".to_string()))
            .unwrap()
    }

    pub(crate) fn app_state(&self) -> SharedAppState {
        let args = get_test_args(
            self.dir.path(),
            Some(self.dir.path().join("aliases.json")),
        );
        Arc::new(AppState::new(&args, Arc::new(StaticIdentityProvider::default())).unwrap())
    }
}

/// Create command line arguments suitable for in-process tests.
pub(crate) fn get_test_args(data_root: &Path, alias_file: Option<PathBuf>) -> CommandLineArgs {
    CommandLineArgs {
        host: "127.0.0.1".to_string(),
        port: 8080,
        https: false,
        cert_file: "".to_string(),
        key_file: "".to_string(),
        graceful_shutdown_timeout: 60,
        data_root: data_root.to_path_buf(),
        alias_file,
        auth_url: Url::parse("http://localhost:9999/auth").unwrap(),
        auth_timeout: 5,
        jwt_secret: TEST_SECRET.to_string(),
        token_lifetime: 3600,
        token_leeway: 0,
    }
}

/// Create a DataRequest object with only required fields set.
pub(crate) fn get_test_data_request() -> DataRequest {
    DataRequest {
        alias: Some("demo".to_string()),
        filename: None,
        field: "density".to_string(),
        mask_array_json: None,
        mask_data_type: None,
        mask_size: None,
        columns: None,
    }
}

/// Create a DataRequest object with all fields set.
pub(crate) fn get_test_data_request_optional() -> DataRequest {
    DataRequest {
        alias: None,
        filename: Some("run_0023.psf".to_string()),
        field: "coordinates".to_string(),
        mask_array_json: Some("[0, 2]".to_string()),
        mask_data_type: Some(DType::Int64),
        mask_size: Some(2),
        columns: Some(vec!["x".to_string(), "z".to_string()]),
    }
}
