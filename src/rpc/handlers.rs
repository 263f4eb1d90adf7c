//! Handler functions for the protocol methods, one per registry entry.
//! Each bridges the wire params onto the symbol resolution service.

use super::{Phase, Session};
use crate::model::{
    DocumentSymbolParams, InitializeParams, InitializeResult, ReferenceParams, ServerCapabilities,
    TextDocumentPositionParams,
};
use crate::service;
use crate::util;
use anyhow::Result;
use serde_json::{Value, json};
use tracing::{info, warn};

fn warn_if_uninitialized(session: &Session, method: &str) {
    if session.phase != Phase::Initialized {
        warn!(%method, phase = ?session.phase, "method called outside initialized session");
    }
}

pub(super) fn handle_initialize(session: &mut Session, params: Value) -> Result<Value> {
    let params: InitializeParams = serde_json::from_value(params)?;
    info!(root_path = ?params.root_path, "initialize");
    if session.phase != Phase::Uninitialized {
        warn!("initialize called more than once on this session");
    }
    session.root_path = params.root_path;
    session.phase = Phase::Initialized;

    let result = InitializeResult {
        capabilities: ServerCapabilities {
            text_document_sync: 0,
            hover_provider: true,
            document_symbol_provider: true,
            definition_provider: true,
            references_provider: true,
        },
    };
    Ok(serde_json::to_value(result)?)
}

pub(super) fn handle_shutdown(session: &mut Session, _params: Value) -> Result<Value> {
    session.phase = Phase::ShutDown;
    Ok(json!(true))
}

pub(super) fn handle_hover(session: &mut Session, params: Value) -> Result<Value> {
    warn_if_uninitialized(session, "textDocument/hover");
    let _params: TextDocumentPositionParams = serde_json::from_value(params)?;
    Ok(serde_json::to_value(service::hover())?)
}

pub(super) fn handle_document_symbol(session: &mut Session, params: Value) -> Result<Value> {
    warn_if_uninitialized(session, "textDocument/documentSymbol");
    let params: DocumentSymbolParams = serde_json::from_value(params)?;
    let path = util::uri_to_path(&params.text_document.uri)?;
    let symbols = service::document_symbols(&path)?;
    Ok(serde_json::to_value(symbols)?)
}

pub(super) fn handle_definition(session: &mut Session, params: Value) -> Result<Value> {
    warn_if_uninitialized(session, "textDocument/definition");
    let params: TextDocumentPositionParams = serde_json::from_value(params)?;
    let path = util::uri_to_path(&params.text_document.uri)?;
    let locations = service::definition(&path, params.position, session.scan)?;
    Ok(serde_json::to_value(locations)?)
}

pub(super) fn handle_references(session: &mut Session, params: Value) -> Result<Value> {
    warn_if_uninitialized(session, "textDocument/references");
    let params: ReferenceParams = serde_json::from_value(params)?;
    let path = util::uri_to_path(&params.text_document.uri)?;
    let locations = service::references(&path, params.position, session.scan)?;
    Ok(serde_json::to_value(locations)?)
}
