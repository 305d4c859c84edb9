//! AST-aware chunking: one chunk per top-level entity boundary.
//!
//! Leading comment blocks (and Python docstrings) become their own chunks
//! attached ahead of the entity. Oversize containers recurse into their
//! members; oversize leaf entities fall back to the generic window. Top
//! level code that belongs to no entity (imports, module statements) is
//! coalesced and window-split so files are covered end to end.

use tree_sitter::{Node, Parser};

use crate::error::ExtractError;
use crate::lang::Lang;
use crate::window::{WindowConfig, split_windows};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SpanKind {
    /// A full entity (function, class, impl block, ...).
    Entity,
    /// A doc comment or docstring attached to the following entity.
    Comment,
    /// Window-split code: leftovers between entities or oversize bodies.
    Fragment,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct CodeSpan {
    pub start: usize,
    pub end: usize,
    pub kind: SpanKind,
}

/// Parse `source` and produce boundary-aligned spans in offset order.
pub(crate) fn chunk_code(
    source: &str,
    lang: Lang,
    config: &WindowConfig,
) -> Result<Vec<CodeSpan>, ExtractError> {
    let grammar = lang
        .grammar()
        .ok_or_else(|| ExtractError::Parse(format!("no grammar for {lang}")))?;

    let mut parser = Parser::new();
    parser
        .set_language(&grammar)
        .map_err(|e| ExtractError::Parse(format!("set_language failed: {e}")))?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| ExtractError::Parse("parser produced no tree".into()))?;

    let mut spans = Vec::new();
    chunk_level(source, &tree.root_node(), lang, config, &mut spans);
    spans.sort_by_key(|s| (s.start, s.end));
    merge_small_spans(source, &mut spans, config);
    Ok(spans)
}

fn chunk_level(
    source: &str,
    parent: &Node,
    lang: Lang,
    config: &WindowConfig,
    out: &mut Vec<CodeSpan>,
) {
    let entity_kinds = lang.entity_node_kinds();
    let comment_kinds = lang.comment_node_kinds();

    let children: Vec<Node> = {
        let mut cursor = parent.walk();
        parent.named_children(&mut cursor).collect()
    };

    let mut leftover: Vec<(usize, usize)> = Vec::new();
    let mut i = 0;
    while i < children.len() {
        let node = children[i];
        let kind = node.kind();

        if comment_kinds.contains(&kind) {
            let start = node.start_byte();
            let mut end = node.end_byte();
            let mut j = i;
            while j + 1 < children.len() && comment_kinds.contains(&children[j + 1].kind()) {
                j += 1;
                end = children[j].end_byte();
            }
            let attached = children.get(j + 1).is_some_and(|next| {
                entity_kinds.contains(&next.kind())
                    && source[end..next.start_byte()].trim().is_empty()
            });
            if attached {
                out.push(CodeSpan {
                    start,
                    end,
                    kind: SpanKind::Comment,
                });
            } else {
                leftover.push((start, end));
            }
            i = j + 1;
            continue;
        }

        if entity_kinds.contains(&kind) {
            emit_entity(source, &node, lang, config, out);
        } else {
            leftover.push((node.start_byte(), node.end_byte()));
        }
        i += 1;
    }

    flush_leftover(source, &leftover, config, out);
}

/// Window-chunk the regions that belong to no entity. Adjacent regions
/// separated only by whitespace coalesce first.
fn flush_leftover(
    source: &str,
    regions: &[(usize, usize)],
    config: &WindowConfig,
    out: &mut Vec<CodeSpan>,
) {
    let mut merged: Vec<(usize, usize)> = Vec::new();
    for &(start, end) in regions {
        if let Some(last) = merged.last_mut()
            && source[last.1..start].trim().is_empty()
        {
            last.1 = end;
        } else {
            merged.push((start, end));
        }
    }

    for (start, end) in merged {
        if source[start..end].trim().is_empty() {
            continue;
        }
        for w in split_windows(&source[start..end], config) {
            out.push(CodeSpan {
                start: start + w.start,
                end: start + w.end,
                kind: SpanKind::Fragment,
            });
        }
    }
}

fn emit_entity(
    source: &str,
    node: &Node,
    lang: Lang,
    config: &WindowConfig,
    out: &mut Vec<CodeSpan>,
) {
    if let Some((ds, de)) = docstring_range(node, lang, source) {
        out.push(CodeSpan {
            start: ds,
            end: de,
            kind: SpanKind::Comment,
        });
    }

    let size = node.end_byte() - node.start_byte();
    if size <= config.max_chunk_size {
        out.push(CodeSpan {
            start: node.start_byte(),
            end: node.end_byte(),
            kind: SpanKind::Entity,
        });
        return;
    }

    if lang.container_node_kinds().contains(&node.kind()) {
        let entity_kinds = lang.entity_node_kinds();

        let direct = {
            let mut cursor = node.walk();
            node.named_children(&mut cursor)
                .any(|c| entity_kinds.contains(&c.kind()))
        };
        if direct {
            chunk_level(source, node, lang, config, out);
            return;
        }

        // Members usually sit one level down, inside a body/block node.
        let bodies: Vec<Node> = {
            let mut cursor = node.walk();
            node.named_children(&mut cursor)
                .filter(|body| {
                    let mut inner = body.walk();
                    body.named_children(&mut inner)
                        .any(|c| entity_kinds.contains(&c.kind()))
                })
                .collect()
        };
        if !bodies.is_empty() {
            for body in bodies {
                chunk_level(source, &body, lang, config, out);
            }
            return;
        }
    }

    // Oversize leaf entity: generic chunking over its range.
    let base = node.start_byte();
    for w in split_windows(&source[node.byte_range()], config) {
        out.push(CodeSpan {
            start: base + w.start,
            end: base + w.end,
            kind: SpanKind::Fragment,
        });
    }
}

/// Python docstring: a string expression as the first statement of the body.
fn docstring_range(node: &Node, lang: Lang, _source: &str) -> Option<(usize, usize)> {
    if lang != Lang::Python {
        return None;
    }
    let body = node.child_by_field_name("body")?;
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let inner = first.named_child(0)?;
    if inner.kind() == "string" {
        Some((first.start_byte(), first.end_byte()))
    } else {
        None
    }
}

fn merge_small_spans(source: &str, spans: &mut Vec<CodeSpan>, config: &WindowConfig) {
    let mut i = 0;
    while i + 1 < spans.len() {
        let cur_len = spans[i].end - spans[i].start;
        let next = spans[i + 1];
        let disjoint = spans[i].end <= next.start;
        let gap_is_ws = disjoint && source[spans[i].end..next.start].trim().is_empty();

        if cur_len < config.min_chunk_size
            && spans[i].kind != SpanKind::Comment
            && next.kind != SpanKind::Comment
            && gap_is_ws
            && next.end - spans[i].start <= config.max_chunk_size
        {
            spans[i].end = next.end;
            spans.remove(i + 1);
        } else {
            i += 1;
        }
    }
}
