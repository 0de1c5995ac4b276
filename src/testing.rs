// In-memory stand-ins for the network, shared by the unit tests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::error::TransportError;
use crate::fetcher::{HttpTransport, TransportResponse};

enum Canned {
    Body {
        status: u16,
        content_type: String,
        bytes: Vec<u8>,
    },
    Timeout,
}

/// A transport that answers from a fixed URL → response table. Unknown URLs
/// fail to connect.
#[derive(Default)]
pub struct FakeTransport {
    routes: HashMap<String, Canned>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, url: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.routes.insert(
            normalize_key(url),
            Canned::Body {
                status: 200,
                content_type: content_type.to_string(),
                bytes: bytes.to_vec(),
            },
        );
        self
    }

    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.routes.insert(
            normalize_key(url),
            Canned::Body {
                status,
                content_type: "text/html".to_string(),
                bytes: b"<html><body>error</body></html>".to_vec(),
            },
        );
        self
    }

    pub fn with_timeout(mut self, url: &str) -> Self {
        self.routes.insert(normalize_key(url), Canned::Timeout);
        self
    }
}

fn normalize_key(url: &str) -> String {
    Url::parse(url).map(|u| u.to_string()).unwrap_or_else(|_| url.to_string())
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn get(
        &self,
        url: &Url,
        _timeout: Duration,
        _headers: &[(String, String)],
    ) -> Result<TransportResponse, TransportError> {
        match self.routes.get(url.as_str()) {
            Some(Canned::Body {
                status,
                content_type,
                bytes,
            }) => Ok(TransportResponse {
                status: *status,
                content_type: Some(content_type.clone()),
                bytes: bytes.clone(),
                final_url: url.clone(),
            }),
            Some(Canned::Timeout) => Err(TransportError::Timeout),
            None => Err(TransportError::Connect(format!("no route to {url}"))),
        }
    }
}

/// A PDF with one page per entry of `pages`, each page showing that string
/// in Courier. Built with lopdf so the fixtures stay out of the repo.
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}
