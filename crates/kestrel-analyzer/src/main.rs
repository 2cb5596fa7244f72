use dashmap::DashMap;
use kestrel_syntax::lexer::RESERVED_WORDS;
use kestrel_syntax::semantic_tokens::LEGEND;
use kestrel_syntax::{Diagnostic as CompilerDiagnostic, Diagnostics, provide_semantic_tokens};
use libkestrel::compile;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService, Server};

#[derive(Debug)]
struct Backend {
    client: Client,
    documents: DashMap<Url, Document>,
}

#[derive(Debug, Clone, Default)]
struct Document {
    text: String,
    /// Declared variables as `(name, type)`, from the last compile that
    /// got through parsing.
    identifiers: Vec<(String, String)>,
}

/// What a single compile of a document tells the editor.
#[derive(Debug)]
struct Analysis {
    diagnostics: Vec<Diagnostic>,
    identifiers: Option<Vec<(String, String)>>,
}

fn analyze(text: &str) -> Analysis {
    let mut collected = Diagnostics::new();
    let result = compile(text, &mut collected);

    let identifiers = result.syntax.map(|syntax| {
        let mut names: Vec<_> = syntax
            .symbols
            .iter()
            .map(|(_, entry)| (entry.name.clone(), entry.ty.to_string()))
            .collect();
        names.sort();
        names.dedup_by(|a, b| a.0 == b.0);
        names
    });

    let diagnostics = collected
        .all()
        .into_iter()
        .map(|(diagnostic, is_error)| {
            let severity = if is_error {
                DiagnosticSeverity::ERROR
            } else {
                DiagnosticSeverity::WARNING
            };
            to_lsp(diagnostic, severity, text)
        })
        .collect();

    Analysis { diagnostics, identifiers }
}

/// Underline the whole line the diagnostic points at.
fn to_lsp(diagnostic: &CompilerDiagnostic, severity: DiagnosticSeverity, text: &str) -> Diagnostic {
    let line = diagnostic.line.unwrap_or(1).saturating_sub(1);
    let width = text.lines().nth(line).map_or(0, |l| l.chars().count());
    Diagnostic {
        range: Range::new(
            Position::new(line as u32, 0),
            Position::new(line as u32, width as u32),
        ),
        severity: Some(severity),
        code: Some(NumberOrString::String(diagnostic.kind.code().to_owned())),
        source: Some("kestrel".to_owned()),
        message: diagnostic.message.clone(),
        ..Default::default()
    }
}

impl Backend {
    async fn on_change(&self, uri: Url, text: String, version: Option<i32>) {
        let source = text.clone();
        let analysis = match tokio::task::spawn_blocking(move || analyze(&source)).await {
            Ok(analysis) => analysis,
            Err(err) => {
                tracing::error!(%err, %uri, "analysis task failed");
                return;
            }
        };
        tracing::debug!(%uri, diagnostics = analysis.diagnostics.len(), "document analyzed");

        let identifiers = match analysis.identifiers {
            Some(identifiers) => identifiers,
            None => self
                .documents
                .get(&uri)
                .map(|doc| doc.identifiers.clone())
                .unwrap_or_default(),
        };
        self.documents.insert(uri.clone(), Document { text, identifiers });

        self.client
            .publish_diagnostics(uri, analysis.diagnostics, version)
            .await;
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, _: InitializeParams) -> Result<InitializeResult> {
        Ok(InitializeResult {
            server_info: Some(ServerInfo {
                name: "kestrel-analyzer".to_owned(),
                version: Some(env!("CARGO_PKG_VERSION").to_owned()),
            }),
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                completion_provider: Some(CompletionOptions {
                    resolve_provider: Some(false),
                    ..Default::default()
                }),
                semantic_tokens_provider: Some(
                    SemanticTokensServerCapabilities::SemanticTokensOptions(
                        SemanticTokensOptions {
                            work_done_progress_options: Default::default(),
                            legend: SemanticTokensLegend {
                                token_types: LEGEND.to_vec(),
                                token_modifiers: vec![],
                            },
                            range: None,
                            full: Some(SemanticTokensFullOptions::Bool(true)),
                        },
                    ),
                ),
                ..ServerCapabilities::default()
            },
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "kestrel-analyzer initialized")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let doc = params.text_document;
        self.on_change(doc.uri, doc.text, Some(doc.version)).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        // full sync: the last change holds the whole document
        if let Some(change) = params.content_changes.into_iter().last() {
            let doc = params.text_document;
            self.on_change(doc.uri, change.text, Some(doc.version)).await;
        }
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        if let Some(text) = params.text {
            self.on_change(params.text_document.uri, text, None).await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        self.documents.remove(&uri);
        self.client.publish_diagnostics(uri, vec![], None).await;
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let uri = params.text_document_position.text_document.uri;
        let mut items: Vec<_> = RESERVED_WORDS
            .iter()
            .map(|word| CompletionItem {
                label: (*word).to_owned(),
                kind: Some(CompletionItemKind::KEYWORD),
                ..Default::default()
            })
            .collect();

        if let Some(doc) = self.documents.get(&uri) {
            items.extend(doc.identifiers.iter().map(|(name, ty)| CompletionItem {
                label: name.clone(),
                kind: Some(CompletionItemKind::VARIABLE),
                detail: Some(ty.clone()),
                ..Default::default()
            }));
        }
        Ok(Some(CompletionResponse::Array(items)))
    }

    async fn semantic_tokens_full(
        &self,
        params: SemanticTokensParams,
    ) -> Result<Option<SemanticTokensResult>> {
        let uri = params.text_document.uri;
        let Some(text) = self.documents.get(&uri).map(|doc| doc.text.clone()) else {
            return Ok(None);
        };
        Ok(Some(SemanticTokensResult::Tokens(SemanticTokens {
            result_id: None,
            data: provide_semantic_tokens(&text),
        })))
    }
}

#[tokio::main]
async fn main() {
    // stdout carries JSON-RPC
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let (stdin, stdout) = (tokio::io::stdin(), tokio::io::stdout());

    let (service, socket) = LspService::new(|client| Backend {
        client,
        documents: DashMap::new(),
    });
    Server::new(stdin, stdout, socket).serve(service).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_reports_errors_and_warnings() {
        let text = "{\n  int a\n  b = 1\n} $";
        let analysis = analyze(text);
        assert_eq!(analysis.diagnostics.len(), 1);
        let diagnostic = &analysis.diagnostics[0];
        assert_eq!(diagnostic.severity, Some(DiagnosticSeverity::ERROR));
        assert_eq!(diagnostic.range.start, Position::new(2, 0));
        assert_eq!(diagnostic.range.end, Position::new(2, 7));
        assert_eq!(
            diagnostic.code,
            Some(NumberOrString::String("parse::undeclared-variable".to_owned()))
        );
        assert!(analysis.identifiers.is_none());
    }

    #[test]
    fn test_identifiers_are_deduplicated() {
        let analysis =
            analyze("{ int a a = 1 { string a a = \"x\" print(a) } print(a) boolean b } $");
        assert_eq!(
            analysis.identifiers,
            Some(vec![
                ("a".to_owned(), "int".to_owned()),
                ("b".to_owned(), "boolean".to_owned()),
            ])
        );
        // b is uninitialized and unused
        assert_eq!(analysis.diagnostics.len(), 2);
        assert!(
            analysis
                .diagnostics
                .iter()
                .all(|d| d.severity == Some(DiagnosticSeverity::WARNING))
        );
    }
}
