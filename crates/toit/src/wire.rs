// Copyright (c) The Toitware Authors.
// Licensed under the MIT License.

//! JSON shapes for the LSP-mode responses. `toit_language_service`'s
//! response types stay plain domain structs; this module is where the
//! binary that owns the wire format converts them to `serde`-derived DTOs
//! and serializes one JSON value per line.

use serde::Serialize;
use toit_data_structures::line_column::{Position, Range};
use toit_language_service::dispatch::{CompletionItem, DefinitionLocation, DispatchResponse, SemanticToken, SymbolKind};
use toit_language_service::summary::{ModuleSummary, SummaryKind, SymbolSummary};

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WireSymbolKind {
    Class,
    Method,
    Field,
    Global,
    Local,
}

impl From<SymbolKind> for WireSymbolKind {
    fn from(kind: SymbolKind) -> Self {
        match kind {
            SymbolKind::Class => Self::Class,
            SymbolKind::Method => Self::Method,
            SymbolKind::Field => Self::Field,
            SymbolKind::Global => Self::Global,
            SymbolKind::Local => Self::Local,
        }
    }
}

#[derive(Serialize)]
pub struct WirePosition {
    pub line: u32,
    pub column: u32,
}

impl From<Position> for WirePosition {
    fn from(position: Position) -> Self {
        Self {
            line: position.line,
            column: position.column,
        }
    }
}

#[derive(Serialize)]
pub struct WireRange {
    pub start: WirePosition,
    pub end: WirePosition,
}

impl From<Range> for WireRange {
    fn from(range: Range) -> Self {
        Self {
            start: range.start.into(),
            end: range.end.into(),
        }
    }
}

#[derive(Serialize)]
pub struct WireCompletionItem {
    pub label: String,
    pub kind: WireSymbolKind,
    pub detail: String,
}

impl From<CompletionItem> for WireCompletionItem {
    fn from(item: CompletionItem) -> Self {
        Self {
            label: item.label,
            kind: item.kind.into(),
            detail: item.detail,
        }
    }
}

#[derive(Serialize)]
pub struct WireDefinitionLocation {
    pub absolute_path: String,
    pub range: WireRange,
}

impl From<DefinitionLocation> for WireDefinitionLocation {
    fn from(location: DefinitionLocation) -> Self {
        Self {
            absolute_path: location.absolute_path,
            range: location.range.into(),
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WireDispatchResponse {
    Completions { items: Vec<WireCompletionItem> },
    Definitions { items: Vec<WireDefinitionLocation> },
}

impl From<DispatchResponse> for WireDispatchResponse {
    fn from(response: DispatchResponse) -> Self {
        match response {
            DispatchResponse::Completions(items) => Self::Completions {
                items: items.into_iter().map(Into::into).collect(),
            },
            DispatchResponse::Definitions(items) => Self::Definitions {
                items: items.into_iter().map(Into::into).collect(),
            },
        }
    }
}

#[derive(Serialize)]
pub struct WireSemanticToken {
    pub range: WireRange,
    pub kind: WireSymbolKind,
}

impl From<SemanticToken> for WireSemanticToken {
    fn from(token: SemanticToken) -> Self {
        Self {
            range: token.range.into(),
            kind: token.kind.into(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WireSummaryKind {
    Class,
    Method,
    Global,
}

impl From<SummaryKind> for WireSummaryKind {
    fn from(kind: SummaryKind) -> Self {
        match kind {
            SummaryKind::Class => Self::Class,
            SummaryKind::Method => Self::Method,
            SummaryKind::Global => Self::Global,
        }
    }
}

#[derive(Serialize)]
pub struct WireSymbolSummary {
    pub name: String,
    pub kind: WireSummaryKind,
    pub toitdoc_summary: Option<String>,
}

impl From<SymbolSummary> for WireSymbolSummary {
    fn from(summary: SymbolSummary) -> Self {
        Self {
            name: summary.name,
            kind: summary.kind.into(),
            toitdoc_summary: summary.toitdoc_summary,
        }
    }
}

#[derive(Serialize)]
pub struct WireModuleSummary {
    pub exported: Vec<WireSymbolSummary>,
}

impl From<ModuleSummary> for WireModuleSummary {
    fn from(summary: ModuleSummary) -> Self {
        Self {
            exported: summary.exported.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completions_response_serializes_with_a_kind_tag() {
        let response = WireDispatchResponse::from(DispatchResponse::Completions(vec![CompletionItem {
            label: "speak".to_string(),
            kind: SymbolKind::Method,
            detail: "speak -> any".to_string(),
        }]));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["kind"], "completions");
        assert_eq!(json["items"][0]["label"], "speak");
        assert_eq!(json["items"][0]["kind"], "method");
    }

    #[test]
    fn module_summary_serializes_nested_symbols() {
        let summary = WireModuleSummary::from(ModuleSummary {
            exported: vec![SymbolSummary {
                name: "Dog".to_string(),
                kind: SummaryKind::Class,
                toitdoc_summary: Some("A loyal companion.".to_string()),
            }],
        });
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["exported"][0]["name"], "Dog");
        assert_eq!(json["exported"][0]["kind"], "class");
    }
}
