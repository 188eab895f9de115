//! Recursive-descent parser for the query grammar in §4.2.

use std::collections::HashMap;

use super::ast::*;
use super::lexer::{lex, Token, TokenKind};
use crate::error::QueryError;
use crate::types::Direction;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

fn parse_err(pos: usize, message: impl Into<String>) -> QueryError {
    QueryError::Parse {
        pos,
        message: message.into(),
    }
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<Token, QueryError> {
        if std::mem::discriminant(self.peek_kind()) == std::mem::discriminant(kind) {
            Ok(self.advance())
        } else {
            Err(parse_err(
                self.peek().pos,
                format!("expected {kind:?}, found {:?}", self.peek_kind()),
            ))
        }
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.peek_kind()) == std::mem::discriminant(kind)
    }

    fn expect_identifier(&mut self) -> Result<String, QueryError> {
        match self.peek_kind().clone() {
            TokenKind::Identifier(s) => {
                self.advance();
                Ok(s)
            }
            other => Err(parse_err(self.peek().pos, format!("expected identifier, found {other:?}"))),
        }
    }

    fn parse_query(&mut self) -> Result<Query, QueryError> {
        self.expect(&TokenKind::Match)?;
        let pattern = self.parse_pattern()?;

        let where_clause = if self.check(&TokenKind::Where) {
            self.advance();
            Some(self.parse_conditions()?)
        } else {
            None
        };

        let return_spec = if self.check(&TokenKind::Return) {
            self.advance();
            Some(self.parse_return_spec()?)
        } else {
            None
        };

        self.expect(&TokenKind::Eof)?;

        Ok(Query {
            pattern,
            where_clause,
            return_spec,
        })
    }

    fn parse_pattern(&mut self) -> Result<Pattern, QueryError> {
        let mut elements = vec![PatternElement::Node(self.parse_node_pattern()?)];
        while self.check(&TokenKind::Dash) || self.check(&TokenKind::LAngle) {
            let rel = self.parse_rel_pattern()?;
            elements.push(PatternElement::Rel(rel));
            elements.push(PatternElement::Node(self.parse_node_pattern()?));
        }
        Ok(Pattern { elements })
    }

    fn parse_node_pattern(&mut self) -> Result<NodePattern, QueryError> {
        self.expect(&TokenKind::LParen)?;

        let variable = if let TokenKind::Identifier(_) = self.peek_kind() {
            Some(self.expect_identifier()?)
        } else {
            None
        };

        let label = if self.check(&TokenKind::Colon) {
            self.advance();
            Some(self.expect_identifier()?)
        } else {
            None
        };

        let mut properties = HashMap::new();
        if self.check(&TokenKind::LBrace) {
            self.advance();
            if !self.check(&TokenKind::RBrace) {
                loop {
                    let key = self.expect_identifier()?;
                    self.expect(&TokenKind::Colon)?;
                    let value = self.expect_string_literal()?;
                    properties.insert(key, value);
                    if self.check(&TokenKind::Comma) {
                        self.advance();
                        continue;
                    }
                    break;
                }
            }
            self.expect(&TokenKind::RBrace)?;
        }

        self.expect(&TokenKind::RParen)?;

        Ok(NodePattern {
            variable,
            label,
            properties,
        })
    }

    fn expect_string_literal(&mut self) -> Result<String, QueryError> {
        match self.peek_kind().clone() {
            TokenKind::StringLit(s) => {
                self.advance();
                Ok(s)
            }
            other => Err(parse_err(self.peek().pos, format!("expected string literal, found {other:?}"))),
        }
    }

    fn parse_rel_pattern(&mut self) -> Result<RelPattern, QueryError> {
        let mut leading_angle = false;
        if self.check(&TokenKind::LAngle) {
            leading_angle = true;
            self.advance();
        }
        self.expect(&TokenKind::Dash)?;

        self.expect(&TokenKind::LBracket)?;

        let variable = if let TokenKind::Identifier(_) = self.peek_kind() {
            Some(self.expect_identifier()?)
        } else {
            None
        };

        let mut types = Vec::new();
        if self.check(&TokenKind::Colon) {
            self.advance();
            types.push(self.expect_identifier()?);
            while self.check(&TokenKind::Pipe) {
                self.advance();
                types.push(self.expect_identifier()?);
            }
        }

        let hops = if self.check(&TokenKind::Star) {
            self.advance();
            self.parse_hop_range()?
        } else {
            HopRange::FIXED
        };

        self.expect(&TokenKind::RBracket)?;
        self.expect(&TokenKind::Dash)?;

        let mut trailing_angle = false;
        if self.check(&TokenKind::RAngle) {
            trailing_angle = true;
            self.advance();
        }

        let direction = match (leading_angle, trailing_angle) {
            (true, false) => Direction::Inbound,
            (false, true) => Direction::Outbound,
            _ => Direction::Any,
        };

        Ok(RelPattern {
            variable,
            types,
            direction,
            hops,
        })
    }

    /// `HopRange := [N] '..' [M] | N`. Bare `*` (no number, no `..`) is
    /// `1..∞` (max 0); `*N` alone is `1..N`; `*N..M` is `N..M`.
    fn parse_hop_range(&mut self) -> Result<HopRange, QueryError> {
        let leading_n = if let TokenKind::Integer(n) = self.peek_kind() {
            let n = *n;
            self.advance();
            Some(n)
        } else {
            None
        };

        if self.check(&TokenKind::DotDot) {
            self.advance();
            let max = if let TokenKind::Integer(m) = self.peek_kind() {
                let m = *m;
                self.advance();
                m as u32
            } else {
                0
            };
            let min = leading_n.unwrap_or(1) as u32;
            return Ok(HopRange { min, max });
        }

        match leading_n {
            Some(n) => Ok(HopRange {
                min: 1,
                max: n as u32,
            }),
            None => Ok(HopRange { min: 1, max: 0 }),
        }
    }

    fn parse_conditions(&mut self) -> Result<WhereClause, QueryError> {
        let mut conditions = vec![self.parse_condition()?];
        let mut saw_or = false;
        let mut saw_and = false;

        loop {
            if self.check(&TokenKind::And) {
                self.advance();
                saw_and = true;
                conditions.push(self.parse_condition()?);
            } else if self.check(&TokenKind::Or) {
                self.advance();
                saw_or = true;
                conditions.push(self.parse_condition()?);
            } else {
                break;
            }
        }

        // §4.2/§9: a mixed AND/OR WHERE flattens into a single connective;
        // OR takes precedence if any OR was seen, even with AND present.
        let connective = if saw_or {
            Connective::Or
        } else if saw_and {
            Connective::And
        } else {
            Connective::And
        };

        Ok(WhereClause {
            connective,
            conditions,
        })
    }

    fn parse_condition(&mut self) -> Result<Condition, QueryError> {
        let variable = self.expect_identifier()?;
        self.expect(&TokenKind::Dot)?;
        let property = self.expect_identifier()?;

        let op = self.parse_compare_op()?;
        let value = self.parse_condition_value()?;

        Ok(Condition {
            variable,
            property,
            op,
            value,
        })
    }

    fn parse_compare_op(&mut self) -> Result<CompareOp, QueryError> {
        let op = match self.peek_kind().clone() {
            TokenKind::Eq => {
                self.advance();
                CompareOp::Eq
            }
            TokenKind::RegexMatch => {
                self.advance();
                CompareOp::RegexMatch
            }
            TokenKind::Gte => {
                self.advance();
                CompareOp::Gte
            }
            TokenKind::Lte => {
                self.advance();
                CompareOp::Lte
            }
            TokenKind::RAngle => {
                self.advance();
                CompareOp::Gt
            }
            TokenKind::LAngle => {
                self.advance();
                CompareOp::Lt
            }
            TokenKind::Contains => {
                self.advance();
                CompareOp::Contains
            }
            TokenKind::Starts => {
                self.advance();
                self.expect(&TokenKind::With)?;
                CompareOp::StartsWith
            }
            other => return Err(parse_err(self.peek().pos, format!("expected comparison operator, found {other:?}"))),
        };
        Ok(op)
    }

    fn parse_condition_value(&mut self) -> Result<ConditionValue, QueryError> {
        match self.peek_kind().clone() {
            TokenKind::StringLit(s) => {
                self.advance();
                Ok(ConditionValue::String(s))
            }
            TokenKind::Integer(n) => {
                self.advance();
                Ok(ConditionValue::Integer(n))
            }
            TokenKind::Decimal(d) => {
                self.advance();
                Ok(ConditionValue::Decimal(d))
            }
            other => Err(parse_err(self.peek().pos, format!("expected a value literal, found {other:?}"))),
        }
    }

    fn parse_return_spec(&mut self) -> Result<ReturnSpec, QueryError> {
        let distinct = if self.check(&TokenKind::Distinct) {
            self.advance();
            true
        } else {
            false
        };

        let mut items = vec![self.parse_return_item()?];
        while self.check(&TokenKind::Comma) {
            self.advance();
            items.push(self.parse_return_item()?);
        }

        let order_by = if self.check(&TokenKind::Order) {
            self.advance();
            self.expect(&TokenKind::By)?;
            Some(self.parse_order_by(&items)?)
        } else {
            None
        };

        let limit = if self.check(&TokenKind::Limit) {
            self.advance();
            match self.peek_kind().clone() {
                TokenKind::Integer(n) if n >= 0 => {
                    self.advance();
                    Some(n as u32)
                }
                other => return Err(parse_err(self.peek().pos, format!("expected non-negative integer after LIMIT, found {other:?}"))),
            }
        } else {
            None
        };

        Ok(ReturnSpec {
            distinct,
            items,
            order_by,
            limit,
        })
    }

    fn parse_return_item(&mut self) -> Result<ReturnItem, QueryError> {
        if self.check(&TokenKind::Count) {
            self.advance();
            self.expect(&TokenKind::LParen)?;
            let variable = self.expect_identifier()?;
            self.expect(&TokenKind::RParen)?;
            let alias = self.parse_optional_alias()?;
            return Ok(ReturnItem::Count { variable, alias });
        }

        let variable = self.expect_identifier()?;
        let property = if self.check(&TokenKind::Dot) {
            self.advance();
            Some(self.expect_identifier()?)
        } else {
            None
        };
        let alias = self.parse_optional_alias()?;

        Ok(ReturnItem::Var {
            variable,
            property,
            alias,
        })
    }

    fn parse_optional_alias(&mut self) -> Result<Option<String>, QueryError> {
        if self.check(&TokenKind::As) {
            self.advance();
            Ok(Some(self.expect_identifier()?))
        } else {
            Ok(None)
        }
    }

    /// ORDER BY field resolution. Accepts a bare identifier matching an
    /// item's alias or variable, `var.property`, or the literal textual
    /// form `COUNT(var)` — all map onto the same typed [`OrderKey`]
    /// (§9's resolution of the ORDER BY/aggregate open question).
    fn parse_order_by(&mut self, items: &[ReturnItem]) -> Result<OrderBy, QueryError> {
        let key = if self.check(&TokenKind::Count) {
            self.advance();
            self.expect(&TokenKind::LParen)?;
            let variable = self.expect_identifier()?;
            self.expect(&TokenKind::RParen)?;
            OrderKey::Count(variable)
        } else {
            let first = self.expect_identifier()?;
            if self.check(&TokenKind::Dot) {
                self.advance();
                let prop = self.expect_identifier()?;
                OrderKey::Var(first, Some(prop))
            } else {
                resolve_bare_order_field(&first, items)
            }
        };

        let direction = if self.check(&TokenKind::Asc) {
            self.advance();
            SortDirection::Asc
        } else if self.check(&TokenKind::Desc) {
            self.advance();
            SortDirection::Desc
        } else {
            SortDirection::Asc
        };

        Ok(OrderBy { key, direction })
    }
}

/// A bare ORDER BY identifier first tries to match a RETURN alias, then a
/// bare RETURN variable; otherwise it's treated as a plain variable
/// reference (e.g. ordering by a node variable bound outside RETURN items
/// is not meaningful, but we still resolve it as `Var(name, None)` so the
/// executor can report "field not found" uniformly at evaluation time).
fn resolve_bare_order_field(name: &str, items: &[ReturnItem]) -> OrderKey {
    for item in items {
        match item {
            ReturnItem::Count { alias: Some(a), variable } if a == name => {
                return OrderKey::Count(variable.clone())
            }
            ReturnItem::Var {
                alias: Some(a),
                variable,
                property,
            } if a == name => return OrderKey::Var(variable.clone(), property.clone()),
            ReturnItem::Var {
                alias: None,
                variable,
                property: None,
            } if variable == name => return OrderKey::Var(variable.clone(), None),
            _ => {}
        }
    }
    OrderKey::Alias(name.to_string())
}

/// Lex and parse `input` into a [`Query`] AST.
pub fn parse(input: &str) -> Result<Query, QueryError> {
    let tokens = lex(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    parser.parse_query()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_element_parity_holds_for_multi_hop_patterns() {
        let q = parse("MATCH (a)-[:CALLS]->(b)-[:CALLS]->(c) RETURN a.name").unwrap();
        // k=2 relationship/node pairs -> 2k+1 = 5 elements.
        assert_eq!(q.pattern.elements.len(), 5);
        assert!(matches!(q.pattern.elements[0], PatternElement::Node(_)));
        assert!(matches!(q.pattern.elements[1], PatternElement::Rel(_)));
        assert!(matches!(q.pattern.elements[2], PatternElement::Node(_)));
        assert!(matches!(q.pattern.elements[3], PatternElement::Rel(_)));
        assert!(matches!(q.pattern.elements[4], PatternElement::Node(_)));
    }

    #[test]
    fn direction_inbound_outbound_any() {
        let inbound = parse("MATCH (a)<-[:CALLS]-(b) RETURN a.name").unwrap();
        let PatternElement::Rel(rel) = &inbound.pattern.elements[1] else { panic!() };
        assert_eq!(rel.direction, Direction::Inbound);

        let outbound = parse("MATCH (a)-[:CALLS]->(b) RETURN a.name").unwrap();
        let PatternElement::Rel(rel) = &outbound.pattern.elements[1] else { panic!() };
        assert_eq!(rel.direction, Direction::Outbound);

        let any = parse("MATCH (a)-[:CALLS]-(b) RETURN a.name").unwrap();
        let PatternElement::Rel(rel) = &any.pattern.elements[1] else { panic!() };
        assert_eq!(rel.direction, Direction::Any);
    }

    #[test]
    fn hop_range_shorthands() {
        let q = parse("MATCH (a)-[:CALLS*1..3]->(b) RETURN a.name").unwrap();
        let PatternElement::Rel(rel) = &q.pattern.elements[1] else { panic!() };
        assert_eq!((rel.hops.min, rel.hops.max), (1, 3));

        let q = parse("MATCH (a)-[:CALLS*3]->(b) RETURN a.name").unwrap();
        let PatternElement::Rel(rel) = &q.pattern.elements[1] else { panic!() };
        assert_eq!((rel.hops.min, rel.hops.max), (1, 3));

        let q = parse("MATCH (a)-[:CALLS*]->(b) RETURN a.name").unwrap();
        let PatternElement::Rel(rel) = &q.pattern.elements[1] else { panic!() };
        assert_eq!((rel.hops.min, rel.hops.max), (1, 0));
    }

    #[test]
    fn where_mixed_and_or_collapses_to_or() {
        let q = parse("MATCH (a) WHERE a.x = 'v' AND a.y = 'w' OR a.z = 'q' RETURN a.name").unwrap();
        let clause = q.where_clause.unwrap();
        assert_eq!(clause.connective, Connective::Or);
        assert_eq!(clause.conditions.len(), 3);
    }

    #[test]
    fn where_and_only_stays_and() {
        let q = parse("MATCH (a) WHERE a.x = 'v' AND a.y = 'w' RETURN a.name").unwrap();
        let clause = q.where_clause.unwrap();
        assert_eq!(clause.connective, Connective::And);
    }

    #[test]
    fn return_count_with_alias_and_order_by() {
        let q = parse(
            "MATCH (a)-[:CALLS]->(b) RETURN a.name, COUNT(b) AS n ORDER BY n DESC",
        )
        .unwrap();
        let spec = q.return_spec.unwrap();
        assert_eq!(spec.items.len(), 2);
        let order = spec.order_by.unwrap();
        assert_eq!(order.key, OrderKey::Count("b".to_string()));
        assert_eq!(order.direction, SortDirection::Desc);
    }

    #[test]
    fn malformed_pattern_is_a_parse_error() {
        let err = parse("MATCH (a RETURN a.name").unwrap_err();
        assert!(matches!(err, QueryError::Parse { .. }));
    }

    #[test]
    fn node_pattern_with_inline_properties() {
        let q = parse("MATCH (f:Function {name: \"A\"}) RETURN f.name").unwrap();
        let PatternElement::Node(node) = &q.pattern.elements[0] else { panic!() };
        assert_eq!(node.label.as_deref(), Some("Function"));
        assert_eq!(node.properties.get("name"), Some(&"A".to_string()));
    }

    #[test]
    fn starts_with_operator_parses_as_two_tokens() {
        let q = parse("MATCH (a) WHERE a.path STARTS WITH '/api' RETURN a.name").unwrap();
        let clause = q.where_clause.unwrap();
        assert_eq!(clause.conditions[0].op, CompareOp::StartsWith);
    }
}
