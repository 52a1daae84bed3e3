//! Google Drive v3 provider built on the `google_drive3` hub.
//!
//! Tokens come from a `yup_oauth2` authorized-user authenticator holding the
//! configured refresh token. Each call builds a hub around the token the
//! service obtained for the request.

use std::io::Cursor;

use async_trait::async_trait;
use google_drive3 as drive3;

use drive3::DriveHub;
use drive3::api::File;
use drive3::common::GetToken;
use drive3::hyper_rustls::HttpsConnector;
use drive3::hyper_util::client::legacy::connect::HttpConnector;
use drive3::yup_oauth2::AuthorizedUserAuthenticator;
use drive3::yup_oauth2::authorized_user::AuthorizedUserSecret;
use drive3::yup_oauth2::client::CustomHyperClientBuilder;

use super::{AccessToken, DriveError, DriveProvider, DriveResult, escape_query_value};
use crate::domain::{FOLDER_MIME_TYPE, FileId, FolderId, FolderName, UploadFile};
use crate::models::config::GoogleDriveConfig;

const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";
const LIST_FIELDS: &str = "nextPageToken, files(id, name)";

type Connector = HttpsConnector<HttpConnector>;

/// Drive client built once at startup from the configured OAuth client.
pub struct GoogleDrive {
    config: GoogleDriveConfig,
    http: drive3::common::Client<Connector>,
    auth: Box<dyn GetToken>,
}

impl GoogleDrive {
    /// Build the HTTP client and an authorized-user authenticator for the
    /// configured refresh token. No request is made until the first token.
    pub async fn new(config: GoogleDriveConfig) -> DriveResult<Self> {
        let http = http_client()?;
        let secret = AuthorizedUserSecret {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            refresh_token: config.refresh_token.clone(),
            key_type: "authorized_user".to_string(),
        };
        let auth = AuthorizedUserAuthenticator::with_client(
            secret,
            CustomHyperClientBuilder::from(http.clone()),
        )
        .build()
        .await
        .map_err(DriveError::Setup)?;

        Ok(Self {
            config,
            http,
            auth: Box::new(auth),
        })
    }

    /// Use `auth` instead of the refresh-token authenticator.
    pub fn with_token_source(
        config: GoogleDriveConfig,
        auth: impl GetToken + 'static,
    ) -> DriveResult<Self> {
        Ok(Self {
            config,
            http: http_client()?,
            auth: Box::new(auth),
        })
    }

    fn hub(&self, token: &AccessToken) -> DriveHub<Connector> {
        let mut hub = DriveHub::new(self.http.clone(), token.as_str().to_string());
        hub.base_url(self.config.base_url.clone());
        hub.root_url(self.config.root_url.clone());
        hub
    }
}

fn http_client() -> DriveResult<drive3::common::Client<Connector>> {
    let connector = drive3::hyper_rustls::HttpsConnectorBuilder::new()
        .with_native_roots()
        .map_err(DriveError::Setup)?
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .build();

    Ok(
        drive3::hyper_util::client::legacy::Client::builder(
            drive3::hyper_util::rt::TokioExecutor::new(),
        )
        .build(connector),
    )
}

fn folder_query(name: &FolderName, parent: Option<&FolderId>) -> String {
    let mut query = format!(
        "name='{}' and mimeType='{}'",
        escape_query_value(name.as_str()),
        FOLDER_MIME_TYPE
    );
    if let Some(parent) = parent {
        query.push_str(&format!(
            " and '{}' in parents",
            escape_query_value(parent.as_str())
        ));
    }
    query
}

fn children_query(parent: &FolderId) -> String {
    format!(
        "'{}' in parents and mimeType='{}'",
        escape_query_value(parent.as_str()),
        FOLDER_MIME_TYPE
    )
}

fn created_id(file: File) -> DriveResult<String> {
    file.id
        .ok_or_else(|| DriveError::Unavailable("drive returned no file id".into()))
}

#[async_trait]
impl DriveProvider for GoogleDrive {
    async fn authenticate(&self) -> DriveResult<AccessToken> {
        match self.auth.get_token(&[DRIVE_SCOPE]).await {
            Ok(Some(token)) => {
                log::debug!("Refreshed drive access token");
                Ok(AccessToken::new(token))
            }
            Ok(None) => Err(DriveError::MissingToken),
            Err(err) => Err(DriveError::Auth(err)),
        }
    }

    async fn find_folder(
        &self,
        token: &AccessToken,
        name: &FolderName,
        parent: Option<&FolderId>,
    ) -> DriveResult<Option<FolderId>> {
        let query = folder_query(name, parent);
        let hub = self.hub(token);
        let (_, list) = hub
            .files()
            .list()
            .q(&query)
            .param("fields", LIST_FIELDS)
            .doit()
            .await?;

        Ok(list
            .files
            .unwrap_or_default()
            .into_iter()
            .find_map(|file| file.id)
            .map(FolderId::new))
    }

    async fn create_folder(
        &self,
        token: &AccessToken,
        name: &FolderName,
        parent: Option<&FolderId>,
    ) -> DriveResult<FolderId> {
        let folder = File {
            name: Some(name.as_str().to_string()),
            mime_type: Some(FOLDER_MIME_TYPE.to_string()),
            parents: parent.map(|parent| vec![parent.as_str().to_string()]),
            ..Default::default()
        };

        let hub = self.hub(token);
        let (_, created) = hub
            .files()
            .create(folder)
            .param("fields", "id")
            .doit_without_upload()
            .await?;
        Ok(FolderId::new(created_id(created)?))
    }

    async fn list_child_folder_names(
        &self,
        token: &AccessToken,
        parent: &FolderId,
    ) -> DriveResult<Vec<String>> {
        let query = children_query(parent);
        let hub = self.hub(token);
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut call = hub.files().list().q(&query).param("fields", LIST_FIELDS);
            if let Some(page_token) = page_token.as_deref() {
                call = call.page_token(page_token);
            }
            let (_, list) = call.doit().await?;

            names.extend(
                list.files
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|file| file.name),
            );
            match list.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        Ok(names)
    }

    async fn create_file(
        &self,
        token: &AccessToken,
        file: &UploadFile,
        parent: &FolderId,
    ) -> DriveResult<FileId> {
        let metadata = File {
            name: Some(file.name().as_str().to_string()),
            parents: Some(vec![parent.as_str().to_string()]),
            ..Default::default()
        };
        let mime: mime::Mime = file
            .content_type()
            .parse()
            .unwrap_or(mime::APPLICATION_OCTET_STREAM);
        let media = Cursor::new(file.content().to_vec());

        let hub = self.hub(token);
        let (_, created) = hub
            .files()
            .create(metadata)
            .param("fields", "id")
            .upload(media, mime)
            .await?;
        Ok(FileId::new(created_id(created)?))
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;
    use std::future::Future;
    use std::pin::Pin;

    use bytes::Bytes;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::domain::FileName;

    /// Token source whose refresh grant is always refused.
    #[derive(Clone)]
    struct RevokedGrant;

    impl GetToken for RevokedGrant {
        fn get_token<'a>(
            &'a self,
            _scopes: &'a [&str],
        ) -> Pin<
            Box<
                dyn Future<Output = Result<Option<String>, Box<dyn Error + Send + Sync>>>
                    + Send
                    + 'a,
            >,
        > {
            Box::pin(async { Err("invalid_grant".into()) })
        }
    }

    fn config_for(server: &MockServer) -> GoogleDriveConfig {
        GoogleDriveConfig {
            client_id: "client-id".into(),
            client_secret: "client-secret".into(),
            redirect_uri: "https://example.com/callback".into(),
            refresh_token: "refresh-token".into(),
            base_url: format!("{}/drive/v3/", server.uri()),
            root_url: format!("{}/", server.uri()),
        }
    }

    fn drive_for(server: &MockServer) -> GoogleDrive {
        GoogleDrive::with_token_source(config_for(server), "ya29.test".to_string()).unwrap()
    }

    fn token() -> AccessToken {
        AccessToken::new("ya29.test")
    }

    #[test]
    fn folder_query_includes_parent_constraint() {
        let name = FolderName::try_new("0003").unwrap();
        let parent = FolderId::new("root-id");

        assert_eq!(
            folder_query(&name, Some(&parent)),
            "name='0003' and mimeType='application/vnd.google-apps.folder' and 'root-id' in parents"
        );
        assert_eq!(
            folder_query(&name, None),
            "name='0003' and mimeType='application/vnd.google-apps.folder'"
        );
    }

    #[tokio::test]
    async fn authenticate_returns_token_from_source() {
        let server = MockServer::start().await;

        let token = drive_for(&server).authenticate().await.unwrap();
        assert_eq!(token.as_str(), "ya29.test");
    }

    #[tokio::test]
    async fn authenticate_rejection_is_auth_error() {
        let server = MockServer::start().await;
        let drive = GoogleDrive::with_token_source(config_for(&server), RevokedGrant).unwrap();

        let err = drive.authenticate().await.unwrap_err();
        assert!(matches!(err, DriveError::Auth(_)));
    }

    #[tokio::test]
    async fn find_folder_returns_first_match() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .and(header("authorization", "Bearer ya29.test"))
            .and(query_param(
                "q",
                "name='Customer Upload' and mimeType='application/vnd.google-apps.folder'",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "files": [
                    {"id": "folder-1", "name": "Customer Upload"},
                    {"id": "folder-2", "name": "Customer Upload"}
                ]
            })))
            .mount(&server)
            .await;

        let name = FolderName::try_new("Customer Upload").unwrap();
        let found = drive_for(&server)
            .find_folder(&token(), &name, None)
            .await
            .unwrap();
        assert_eq!(found, Some(FolderId::new("folder-1")));
    }

    #[tokio::test]
    async fn find_folder_returns_none_when_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "files": [] })))
            .mount(&server)
            .await;

        let name = FolderName::try_new("0001").unwrap();
        let found = drive_for(&server)
            .find_folder(&token(), &name, Some(&FolderId::new("root")))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn create_folder_posts_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/drive/v3/files"))
            .and(query_param("fields", "id"))
            .and(body_string_contains("\"mimeType\":\"application/vnd.google-apps.folder\""))
            .and(body_string_contains("\"parents\":[\"root\"]"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "new-folder" })))
            .expect(1)
            .mount(&server)
            .await;

        let name = FolderName::try_new("0001").unwrap();
        let id = drive_for(&server)
            .create_folder(&token(), &name, Some(&FolderId::new("root")))
            .await
            .unwrap();
        assert_eq!(id, FolderId::new("new-folder"));
    }

    #[tokio::test]
    async fn list_child_folder_names_follows_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .and(query_param("pageToken", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "files": [{"id": "c", "name": "0003"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .and(query_param(
                "q",
                "'root' in parents and mimeType='application/vnd.google-apps.folder'",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "files": [{"id": "a", "name": "0001"}, {"id": "b", "name": "0002"}],
                "nextPageToken": "page-2"
            })))
            .mount(&server)
            .await;

        let names = drive_for(&server)
            .list_child_folder_names(&token(), &FolderId::new("root"))
            .await
            .unwrap();
        assert_eq!(names, vec!["0001", "0002", "0003"]);
    }

    #[tokio::test]
    async fn create_file_uploads_metadata_and_media() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload/drive/v3/files"))
            .and(query_param("uploadType", "multipart"))
            .and(body_string_contains("\"name\":\"dog.jpg\""))
            .and(body_string_contains("\"parents\":[\"batch-7\"]"))
            .and(body_string_contains("JPEGDATA"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "file-1" })))
            .expect(1)
            .mount(&server)
            .await;

        let file = UploadFile::new(
            FileName::try_from_str("dog.jpg").unwrap(),
            Some("image/jpeg".into()),
            Bytes::from_static(b"JPEGDATA"),
        );
        let id = drive_for(&server)
            .create_file(&token(), &file, &FolderId::new("batch-7"))
            .await
            .unwrap();
        assert_eq!(id, FileId::new("file-1"));
    }

    #[tokio::test]
    async fn api_failure_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload/drive/v3/files"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {"code": 403, "message": "The user's Drive storage quota has been exceeded."}
            })))
            .mount(&server)
            .await;

        let file = UploadFile::new(
            FileName::try_from_str("dog.jpg").unwrap(),
            None,
            Bytes::from_static(b"x"),
        );
        let err = drive_for(&server)
            .create_file(&token(), &file, &FolderId::new("batch-7"))
            .await
            .unwrap_err();
        assert!(matches!(err, DriveError::Api(_)), "unexpected error: {err:?}");
    }
}
