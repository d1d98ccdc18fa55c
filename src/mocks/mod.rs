//! Mock implementations for testing.
//!
//! This module provides a scripted transport and a recording signer so the
//! executor and the services can be driven without a network.

mod signer;
mod transport;

pub use signer::{MockSigner, MOCK_AUTHORIZATION};
pub use transport::{MockResponse, MockTransport};

/// Test fixtures for storage operations.
pub struct TestFixtures;

impl TestFixtures {
    /// Primary endpoint of the fixture account.
    pub const PRIMARY_ENDPOINT: &'static str = "https://account.blob.core.windows.net";

    /// Secondary endpoint of the fixture account.
    pub const SECONDARY_ENDPOINT: &'static str = "https://account-secondary.blob.core.windows.net";

    /// Host of the secondary endpoint.
    pub const SECONDARY_HOST: &'static str = "account-secondary.blob.core.windows.net";

    /// Error body in the blob service's XML format.
    pub fn error_xml(code: &str, message: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<Error>
    <Code>{}</Code>
    <Message>{}</Message>
</Error>"#,
            code, message
        )
    }

    /// One page of a blob listing.
    pub fn list_blobs_xml(names: &[&str], next_marker: Option<&str>) -> String {
        let blobs: String = names
            .iter()
            .map(|name| {
                format!(
                    r#"
        <Blob>
            <Name>{}</Name>
            <Properties>
                <Last-Modified>Mon, 15 Jan 2024 10:30:00 GMT</Last-Modified>
                <Etag>0x8D0000000000001</Etag>
                <Content-Length>5</Content-Length>
                <Content-Type>text/plain</Content-Type>
                <BlobType>BlockBlob</BlobType>
            </Properties>
        </Blob>"#,
                    name
                )
            })
            .collect();

        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<EnumerationResults ServiceEndpoint="https://account.blob.core.windows.net/" ContainerName="container">
    <Blobs>{}
    </Blobs>
    <NextMarker>{}</NextMarker>
</EnumerationResults>"#,
            blobs,
            next_marker.unwrap_or_default()
        )
    }
}
