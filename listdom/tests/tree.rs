//! Tests for the in-memory node tree.

use listdom::{MemTree, NodeKind, NodeTree};

#[test]
fn test_append_keeps_child_order() {
    let tree = MemTree::new();
    let root = tree.element();
    let a = tree.element();
    let b = tree.text("b");
    let c = tree.element();
    tree.append(root, a);
    tree.append(root, b);
    tree.append(root, c);
    assert_eq!(tree.children(root), vec![a, b, c]);
}

#[test]
fn test_attach_after_anchor() {
    let tree = MemTree::new();
    let root = tree.element();
    let a = tree.element();
    let b = tree.element();
    tree.append(root, a);
    tree.append(root, b);

    let x = tree.element();
    let y = tree.element();
    tree.attach_after(root, Some(a), &[x, y]).unwrap();
    assert_eq!(tree.children(root), vec![a, x, y, b]);
}

#[test]
fn test_attach_after_none_prepends() {
    let tree = MemTree::new();
    let root = tree.element();
    let a = tree.element();
    tree.append(root, a);

    let x = tree.element();
    tree.attach_after(root, None, &[x]).unwrap();
    assert_eq!(tree.children(root), vec![x, a]);
}

#[test]
fn test_attach_relocates_existing_node() {
    let tree = MemTree::new();
    let root = tree.element();
    let a = tree.element();
    let b = tree.element();
    tree.append(root, a);
    tree.append(root, b);

    // Re-attaching b at the front moves it, it is not duplicated.
    tree.attach_after(root, None, &[b]).unwrap();
    assert_eq!(tree.children(root), vec![b, a]);
}

#[test]
fn test_attach_to_unknown_anchor_fails() {
    let tree = MemTree::new();
    let root = tree.element();
    let stray = tree.element();
    let node = tree.element();
    assert!(tree.attach_after(root, Some(stray), &[node]).is_err());
}

#[test]
fn test_detach_removes_child() {
    let tree = MemTree::new();
    let root = tree.element();
    let a = tree.element();
    let b = tree.element();
    tree.append(root, a);
    tree.append(root, b);

    tree.detach(root, a);
    assert_eq!(tree.children(root), vec![b]);
    assert!(!tree.contains(root, a));

    // Detaching again is a no-op.
    tree.detach(root, a);
    assert_eq!(tree.children(root), vec![b]);
}

#[test]
fn test_clone_node_is_deep_and_detached() {
    let tree = MemTree::new();
    let template = tree.element();
    let label = tree.text("row");
    tree.append(template, label);

    let copy = tree.clone_node(template);
    assert_ne!(copy, template);
    assert_eq!(tree.kind(copy), Some(NodeKind::Element));

    let copied_children = tree.children(copy);
    assert_eq!(copied_children.len(), 1);
    assert_ne!(copied_children[0], label);
    assert_eq!(
        tree.kind(copied_children[0]),
        Some(NodeKind::Text("row".into()))
    );

    // Mutating the copy leaves the template alone.
    tree.detach(copy, copied_children[0]);
    assert_eq!(tree.children(template), vec![label]);
}

#[test]
fn test_is_content_ignores_whitespace_and_blank() {
    let tree = MemTree::new();
    assert!(tree.is_content(tree.element()));
    assert!(tree.is_content(tree.text("x")));
    assert!(!tree.is_content(tree.text("  \n")));
    assert!(!tree.is_content(tree.blank()));
}

#[test]
fn test_injected_attach_failures_are_transient() {
    let tree = MemTree::new();
    let root = tree.element();
    let node = tree.element();

    tree.fail_next_attaches(1);
    assert!(tree.attach_after(root, None, &[node]).is_err());
    // The next attempt goes through.
    tree.attach_after(root, None, &[node]).unwrap();
    assert_eq!(tree.children(root), vec![node]);
    assert_eq!(tree.attach_call_count(), 2);
}

#[test]
fn test_injected_failures_can_skip_leading_attaches() {
    let tree = MemTree::new();
    let root = tree.element();
    let a = tree.element();
    let b = tree.element();

    tree.fail_attaches_after(1, 2);
    tree.attach_after(root, None, &[a]).unwrap();
    assert!(tree.attach_after(root, Some(a), &[b]).is_err());
    assert!(tree.attach_after(root, Some(a), &[b]).is_err());
    tree.attach_after(root, Some(a), &[b]).unwrap();
    assert_eq!(tree.children(root), vec![a, b]);
}
