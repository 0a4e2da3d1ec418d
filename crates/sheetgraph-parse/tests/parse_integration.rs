use sheetgraph_parse::{ASTNodeType, LiteralValue, ReferenceType, Tokenizer, parse};

#[test]
fn plain_text_is_a_literal() {
    let ast = parse("hello").unwrap();
    assert_eq!(
        ast.node_type,
        ASTNodeType::Literal(LiteralValue::Text("hello".into()))
    );
}

#[test]
fn malformed_formulas_report_errors() {
    for formula in ["=A1+", "=SUM(A1", "=(1}", "=1+*2", "=\"unterminated"] {
        assert!(parse(formula).is_err(), "{formula} should not parse");
    }
}

#[test]
fn tokens_render_back_to_source() {
    for formula in [
        "=SUM(A1:B2, 3)",
        "='My Sheet'!$C$4*2",
        "={1,2;3,4}",
        "=-A1%+TRUE",
    ] {
        let tokens = Tokenizer::new(formula).unwrap();
        assert_eq!(tokens.render(), formula);
    }
}

#[test]
fn references_display_like_input() {
    for text in ["A1", "$A$1", "Sheet2!B$3", "A:C", "$2:$5", "'Q1 data'!A1:B9"] {
        let reference = ReferenceType::from_string(text).unwrap();
        assert_eq!(reference.to_string(), text);
    }
}

#[test]
fn unknown_identifiers_become_names() {
    let ast = parse("=Revenue*2").unwrap();
    let deps = ast.get_dependencies();
    assert_eq!(deps.len(), 1);
    assert_eq!(deps[0], &ReferenceType::NamedRange("Revenue".into()));
}
