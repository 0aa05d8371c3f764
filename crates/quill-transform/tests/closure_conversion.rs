//! End-to-end closure conversion through the capture session

use anyhow::{bail, Result};
use quill_codegen::RootContext;
use quill_diagnostics::{DiagnosticCode, DiagnosticEmitter, SimpleEmitter, SourceCache, Span};
use quill_hir::{BinaryOp, CompareOp, Expr, LogicalOp};
use quill_runtime::{FunctionValue, Value};
use quill_transform::closure::{Captured, ScopeKind, Usage};
use quill_transform::{CaptureSession, ClosureError, CompiledExpression, Invariant};
use quill_types::{LocalId, Type};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Open a scope, declare Int parameters and start its body
fn lambda(session: &mut CaptureSession, params: &[&str]) -> Result<Vec<LocalId>> {
    session.open_scope(Span::DUMMY)?;
    let mut ids = Vec::new();
    for name in params {
        ids.push(session.declare_parameter(Type::Int, name, Span::DUMMY)?);
    }
    session.begin_body()?;
    Ok(ids)
}

fn lookup(session: &mut CaptureSession, name: &str) -> Result<Expr> {
    match session.lookup(name)? {
        Some(expr) => Ok(expr),
        None => bail!("`{}` is not in scope", name),
    }
}

fn callable(result: CompiledExpression) -> Result<FunctionValue> {
    match result {
        CompiledExpression::Callable(function) => Ok(function),
        CompiledExpression::Residual(expr) => bail!("expected a callable, got residual {:?}", expr),
    }
}

fn call(function: &FunctionValue, args: &[Value]) -> Result<Value> {
    Ok(function.invoke(args)?)
}

fn call_fn(function: &FunctionValue, args: &[Value]) -> Result<FunctionValue> {
    match call(function, args)? {
        Value::Function(f) => Ok(f),
        other => bail!("expected a function, got {:?}", other),
    }
}

fn and_all(terms: Vec<Expr>) -> Expr {
    terms
        .into_iter()
        .reduce(|left, right| Expr::Logical {
            op: LogicalOp::And,
            left: Box::new(left),
            right: Box::new(right),
        })
        .unwrap_or(Expr::Bool(true))
}

/// (p) => (x) => p + x
#[test]
fn test_two_level_closure() -> Result<()> {
    init();
    let mut session = CaptureSession::new();
    lambda(&mut session, &["p"])?;
    lambda(&mut session, &["x"])?;
    let body = Expr::binary(BinaryOp::Add, lookup(&mut session, "p")?, lookup(&mut session, "x")?);
    let inner = session.close_scope(body, true)?;
    let outer = session.close_scope(inner, true)?;
    assert!(matches!(outer, Expr::Delegate { .. }));

    let inner_scope = session.scope(2).expect("inner scope");
    let ScopeKind::Captured { env, layout, .. } = &inner_scope.kind else {
        bail!("inner scope should capture `p`");
    };
    assert_eq!(env.len(), 1);
    assert_eq!(env.slots()[0].owner, 1);
    assert_eq!(layout.head().arity(), 1);
    assert!(session.scope(1).expect("outer scope").is_static());

    let finalized = session.finalize()?;
    assert!(finalized.arguments.is_empty());
    assert!(finalized.variables.is_empty());

    let outer = callable(finalized.result)?;
    let add_ten = call_fn(&outer, &[Value::Int(10)])?;
    assert_eq!(add_ten.arity(), 1);
    assert_eq!(call(&add_ten, &[Value::Int(5)])?, Value::Int(15));
    assert_eq!(call(&add_ten, &[Value::Int(-10)])?, Value::Int(0));
    Ok(())
}

/// A parameter of the outermost scope read at depth `depth` is carried by
/// every scope in between.
#[test]
fn test_deep_capture_is_forwarded() -> Result<()> {
    init();
    let depth = 5;
    let mut session = CaptureSession::new();
    let names: Vec<String> = (0..depth).map(|i| format!("p{}", i)).collect();
    for name in &names {
        lambda(&mut session, &[name.as_str()])?;
    }

    let body = Expr::binary(
        BinaryOp::Sub,
        lookup(&mut session, "p0")?,
        lookup(&mut session, &names[depth - 1])?,
    );
    let mut token = session.close_scope(body, true)?;
    for _ in 1..depth {
        token = session.close_scope(token, true)?;
    }

    for id in 2..=depth as u32 {
        let scope = session.scope(id).expect("scope");
        let env = scope.env().expect("captured environment");
        assert_eq!(env.len(), 1, "scope {}", id);
        assert!(env.contains(&Captured::Local(0)));
    }

    let mut function = callable(session.finalize()?.result)?;
    for level in 0..depth - 1 {
        function = call_fn(&function, &[Value::Int(100 + level as i64)])?;
    }
    assert_eq!(call(&function, &[Value::Int(1)])?, Value::Int(99));
    Ok(())
}

/// Scopes whose tokens are dropped are dead and contribute no inputs
#[test]
fn test_dropped_subtree_is_pruned() -> Result<()> {
    init();
    let mut session = CaptureSession::new();
    lambda(&mut session, &["x"])?;

    // Dropped: reads argument 3 and `hidden`, and has a child reading `x`
    lambda(&mut session, &[])?;
    let arg = session.capture_argument(3, Type::Int)?;
    let hidden = session.capture_variable("hidden", Type::Int)?;
    lambda(&mut session, &["z"])?;
    let x = lookup(&mut session, "x")?;
    let grandchild = session.close_scope(x, true)?;
    let reads = Expr::binary(BinaryOp::Add, arg, hidden);
    let dropped = session.close_scope(
        Expr::binary(BinaryOp::Add, reads, Expr::call(grandchild, vec![Expr::Integer(0)])),
        true,
    )?;
    let dropped_env = session.scope(2).and_then(|scope| scope.env()).expect("dropped env");
    assert!(dropped_env.variables().contains("hidden"));
    assert!(matches!(dropped, Expr::Placeholder(2)));

    // Kept: (y) => y * x
    lambda(&mut session, &["y"])?;
    let body = Expr::binary(BinaryOp::Mul, lookup(&mut session, "y")?, lookup(&mut session, "x")?);
    let kept = session.close_scope(body, true)?;

    session.close_scope(kept, true)?;
    assert_eq!(session.scope(2).expect("dropped").usage, Usage::Dead);
    assert_eq!(session.scope(3).expect("grandchild").usage, Usage::Dead);
    assert!(session.scope(4).expect("kept").is_alive());
    assert!(session.scope(1).expect("root").is_static());

    let finalized = session.finalize()?;
    assert!(finalized.arguments.is_empty());
    assert!(finalized.variables.is_empty());

    let root = callable(finalized.result)?;
    let times_six = call_fn(&root, &[Value::Int(6)])?;
    assert_eq!(call(&times_six, &[Value::Int(7)])?, Value::Int(42));
    Ok(())
}

/// (x) => (y) => x * y + scale
#[test]
fn test_nested_variable_reads_reach_the_root() -> Result<()> {
    init();
    let mut session = CaptureSession::new();
    lambda(&mut session, &["x"])?;
    lambda(&mut session, &["y"])?;
    let product = Expr::binary(BinaryOp::Mul, lookup(&mut session, "x")?, lookup(&mut session, "y")?);
    let scale = session.capture_variable("scale", Type::Int)?;
    let inner = session.close_scope(Expr::binary(BinaryOp::Add, product, scale), true)?;
    session.close_scope(inner, true)?;

    let inner_env = session.scope(2).and_then(|scope| scope.env()).expect("inner env");
    assert!(inner_env.variables().contains("scale"));
    let root_env = session.scope(1).and_then(|scope| scope.env()).expect("root env");
    assert_eq!(root_env.len(), 1);
    assert!(root_env.contains(&Captured::Variable("scale".to_string())));

    let finalized = session.finalize()?;
    assert!(finalized.arguments.is_empty());
    assert_eq!(finalized.variables.iter().cloned().collect::<Vec<_>>(), vec!["scale".to_string()]);

    let root = finalized
        .result
        .instantiate(&RootContext::default().with_variable("scale", Value::Int(5)))?;
    let times_three = call_fn(&root, &[Value::Int(3)])?;
    assert_eq!(call(&times_three, &[Value::Int(4)])?, Value::Int(17));
    Ok(())
}

fn expected_segments(count: usize) -> usize {
    match count {
        0..=8 => 1,
        9..=15 => 2,
        _ => 3,
    }
}

/// `() => v0 == 0 && v1 == 1 && ...` over `count` external variables
fn read_all(count: usize) -> Result<(CaptureSession, Expr)> {
    let mut session = CaptureSession::new();
    lambda(&mut session, &[])?;
    let mut terms = Vec::new();
    for i in 0..count {
        let var = session.capture_variable(&format!("v{}", i), Type::Int)?;
        terms.push(Expr::compare(CompareOp::Eq, var, Expr::Integer(i as i64)));
    }
    Ok((session, and_all(terms)))
}

#[test]
fn test_carrier_sizes_round_trip() -> Result<()> {
    init();
    for count in 1..=20 {
        let (mut session, body) = read_all(count)?;
        session.close_scope(body, true)?;

        let ScopeKind::Captured { layout, .. } = &session.scope(1).expect("scope").kind else {
            bail!("scope over {} variables should capture", count);
        };
        assert_eq!(layout.len(), count);
        assert_eq!(layout.segments().len(), expected_segments(count), "count {}", count);

        let finalized = session.finalize()?;
        assert_eq!(finalized.variables.len(), count);
        assert!(finalized.result.is_residual());

        let root = (0..count).fold(RootContext::default(), |root, i| {
            root.with_variable(format!("v{}", i), Value::Int(i as i64))
        });
        let function = finalized.result.instantiate(&root)?;
        assert_eq!(call(&function, &[])?, Value::Bool(true), "count {}", count);

        // Any value read from the wrong slot breaks the conjunction
        let shifted = (0..count).fold(RootContext::default(), |root, i| {
            root.with_variable(format!("v{}", i), Value::Int(i as i64 + 1))
        });
        let function = finalized.result.instantiate(&shifted)?;
        assert_eq!(call(&function, &[])?, Value::Bool(false));
    }
    Ok(())
}

#[test]
fn test_eight_and_nine_values() -> Result<()> {
    let (mut session, body) = read_all(8)?;
    session.close_scope(body, true)?;
    let ScopeKind::Captured { layout, .. } = &session.scope(1).expect("scope").kind else {
        bail!("expected a capturing scope");
    };
    assert_eq!(layout.segments().len(), 1);
    assert!(!layout.segments()[0].has_tail());
    assert_eq!(layout.head().arity(), 8);

    let (mut session, body) = read_all(9)?;
    session.close_scope(body, true)?;
    let ScopeKind::Captured { layout, .. } = &session.scope(1).expect("scope").kind else {
        bail!("expected a capturing scope");
    };
    let segments = layout.segments();
    assert_eq!(segments.iter().map(|s| s.len).collect::<Vec<_>>(), vec![7, 2]);
    assert!(segments[0].has_tail());
    assert_eq!(segments[0].carrier.arity(), 8);
    assert_eq!(segments[1].carrier.arity(), 2);
    Ok(())
}

#[test]
fn test_arity_limits() -> Result<()> {
    init();
    let names: Vec<String> = (0..17).map(|i| format!("a{}", i)).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();

    // Static lambdas may use the full callable arity
    let mut session = CaptureSession::new();
    lambda(&mut session, &refs[..16])?;
    session.close_scope(Expr::Void, true)?;
    let function = callable(session.finalize()?.result)?;
    assert_eq!(function.arity(), 16);

    let mut session = CaptureSession::new();
    lambda(&mut session, &refs)?;
    let err = session.close_scope(Expr::Void, true).unwrap_err();
    assert!(matches!(err, ClosureError::UnsupportedArity { count: 17, max: 16, .. }));
    assert_eq!(err.to_diagnostic().code, DiagnosticCode::UnsupportedArity);

    // Capturing lambdas lose one parameter to the carrier
    for (params, ok) in [(15, true), (16, false)] {
        let mut session = CaptureSession::new();
        lambda(&mut session, &["k"])?;
        lambda(&mut session, &refs[..params])?;
        let k = lookup(&mut session, "k")?;
        let inner = session.close_scope(k, true)?;
        let outer = session.close_scope(inner, true);
        assert_eq!(outer.is_ok(), ok, "{} parameters", params);
        if let Err(err) = outer {
            assert!(matches!(err, ClosureError::UnsupportedArity { count: 17, .. }));
            assert!(!err.is_recoverable());
        }
    }
    Ok(())
}

#[test]
fn test_naming_conflict_is_reported_and_recoverable() -> Result<()> {
    let mut cache = SourceCache::new();
    let file = cache.add_file("<expr>", "(x, x) => x".to_string());

    let mut session = CaptureSession::new();
    session.open_scope(Span::new(file, 0, 11))?;
    session.declare_parameter(Type::Int, "x", Span::new(file, 1, 2))?;
    let err = session
        .declare_parameter(Type::Int, "x", Span::new(file, 4, 5))
        .unwrap_err();
    assert!(err.is_recoverable());

    let mut out = Vec::new();
    SimpleEmitter::new(&mut out).emit(&err.to_diagnostic(), &cache)?;
    let text = String::from_utf8(out)?;
    assert!(text.starts_with("<expr>:1:5: error: parameter `x` is already declared"));
    assert!(text.contains("[N001]"));
    assert!(text.contains("first declared here (<expr>:1:2)"));

    // The session keeps going with the first declaration
    session.begin_body()?;
    let x = lookup(&mut session, "x")?;
    session.close_scope(x, true)?;
    let function = callable(session.finalize()?.result)?;
    assert_eq!(call(&function, &[Value::Int(3)])?, Value::Int(3));
    Ok(())
}

#[test]
fn test_protocol_violations() -> Result<()> {
    let mut session = CaptureSession::new();
    assert!(matches!(
        session.lookup("x"),
        Err(ClosureError::InvariantViolation(Invariant::NoOpenScope))
    ));
    assert!(session.close_scope(Expr::Void, false).is_err());

    session.open_scope(Span::DUMMY)?;
    assert!(matches!(
        session.capture_argument(0, Type::Int),
        Err(ClosureError::InvariantViolation(Invariant::ParametersLocked(1)))
    ));
    session.begin_body()?;

    // A body reading a local nobody requested
    let err = session.close_scope(Expr::LocalGet(99), true).unwrap_err();
    assert!(matches!(
        err,
        ClosureError::InvariantViolation(Invariant::UnrequestedCapture { scope: 1, .. })
    ));
    assert_eq!(err.to_diagnostic().code, DiagnosticCode::InvariantViolation);
    Ok(())
}

/// (x) => x + args[1] + offset
#[test]
fn test_residual_reads_root_inputs() -> Result<()> {
    init();
    let mut session = CaptureSession::new();
    lambda(&mut session, &["x"])?;
    let x = lookup(&mut session, "x")?;
    let arg = session.capture_argument(1, Type::Int)?;
    let offset = session.capture_variable("offset", Type::Int)?;
    let body = Expr::binary(BinaryOp::Add, Expr::binary(BinaryOp::Add, x, arg), offset);
    assert!(matches!(session.close_scope(body, true)?, Expr::Placeholder(1)));

    let finalized = session.finalize()?;
    assert_eq!(finalized.arguments.iter().copied().collect::<Vec<_>>(), vec![1]);
    assert_eq!(finalized.variables.iter().cloned().collect::<Vec<_>>(), vec!["offset".to_string()]);
    assert!(finalized.result.is_residual());

    let first = RootContext::new(vec![Value::Int(0), Value::Int(10)]).with_variable("offset", Value::Int(100));
    let second = RootContext::new(vec![Value::Int(0), Value::Int(20)]).with_variable("offset", Value::Int(200));
    let f = finalized.result.instantiate(&first)?;
    let g = finalized.result.instantiate(&second)?;
    assert_eq!(call(&f, &[Value::Int(1)])?, Value::Int(111));
    assert_eq!(call(&g, &[Value::Int(1)])?, Value::Int(221));

    assert!(finalized.result.instantiate(&RootContext::default()).is_err());
    Ok(())
}

/// Static children inside a capturing scope: one compiled eagerly, one left
/// as a lambda for the parent.
#[test]
fn test_static_children_of_capturing_scope() -> Result<()> {
    init();
    let mut session = CaptureSession::new();
    lambda(&mut session, &["x"])?;
    let base = session.capture_argument(0, Type::Int)?;

    lambda(&mut session, &["y"])?;
    let y = lookup(&mut session, "y")?;
    let double = session.close_scope(Expr::binary(BinaryOp::Mul, y, Expr::Integer(2)), true)?;
    assert!(matches!(double, Expr::Delegate { .. }));

    lambda(&mut session, &["z"])?;
    let z = lookup(&mut session, "z")?;
    let negate = session.close_scope(Expr::binary(BinaryOp::Sub, Expr::Integer(0), z), false)?;
    assert!(matches!(negate, Expr::Placeholder(3)));

    let x = lookup(&mut session, "x")?;
    let body = Expr::binary(
        BinaryOp::Add,
        Expr::call(double, vec![x]),
        Expr::call(negate, vec![base]),
    );
    session.close_scope(body, true)?;

    let finalized = session.finalize()?;
    let function = finalized
        .result
        .instantiate(&RootContext::new(vec![Value::Int(5)]))?;
    assert_eq!(call(&function, &[Value::Int(4)])?, Value::Int(3));
    Ok(())
}

#[test]
fn test_sessions_on_separate_threads() -> Result<()> {
    init();
    let results: Vec<Result<Value>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|t| {
                s.spawn(move || -> Result<Value> {
                    let (mut session, body) = read_all(9 + t)?;
                    session.close_scope(body, true)?;
                    let finalized = session.finalize()?;
                    let root = (0..9 + t).fold(RootContext::default(), |root, i| {
                        root.with_variable(format!("v{}", i), Value::Int(i as i64))
                    });
                    call(&finalized.result.instantiate(&root)?, &[])
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|_| Err(anyhow::anyhow!("thread panicked"))))
            .collect()
    });

    for result in results {
        assert_eq!(result?, Value::Bool(true));
    }
    Ok(())
}
