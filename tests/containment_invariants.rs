mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::{attr, book, catalogue, shelf, BOOK, LIBRARY, SHELF};
use modelkit::{Adapter, AdapterResult, ModelError, Notification, Object};

#[derive(Default)]
struct Log(RefCell<Vec<String>>);

impl Adapter for Log {
    fn notify(&self, notification: &Notification) -> AdapterResult {
        let line = match notification {
            Notification::ListInsert { index, .. } => format!("insert {}", index),
            Notification::ListRemove { index, .. } => format!("remove {}", index),
            Notification::ListMove { from, to, .. } => format!("move {} {}", from, to),
            Notification::Parent { new, .. } => format!("parent {}", new.is_some()),
            other => other.to_string(),
        };
        self.0.borrow_mut().push(line);
        Ok(())
    }
}

fn shelves(library: &Object) -> Vec<Object> {
    library.list(attr(&LIBRARY, "shelves")).unwrap().objects()
}

fn books(shelf: &Object) -> Vec<Object> {
    shelf.list(attr(&SHELF, "books")).unwrap().objects()
}

/// Every contained object appears exactly once in its container's slot.
fn assert_consistent(root: &Object) {
    for object in root.descendants() {
        let (parent, attribute) = object.container().expect("descendant has a container");
        let count = parent
            .list(attribute)
            .unwrap()
            .objects()
            .iter()
            .filter(|o| o.ptr_eq(&object))
            .count();
        assert_eq!(count, 1, "{:?} listed {} times", object, count);
    }
}

#[test]
fn test_moving_between_containers_keeps_single_parent() {
    let library = catalogue();
    let [a, b] = <[Object; 2]>::try_from(shelves(&library)).unwrap();
    let dune = books(&a)[0].clone();

    b.list(attr(&SHELF, "books")).unwrap().push(&dune).unwrap();

    assert_eq!(books(&a).len(), 1);
    assert_eq!(books(&b).len(), 2);
    assert_eq!(dune.parent(), Some(b.clone()));
    assert_consistent(&library);
}

#[test]
fn test_move_notifies_old_container_new_container_and_child() {
    let library = catalogue();
    let [a, b] = <[Object; 2]>::try_from(shelves(&library)).unwrap();
    let dune = books(&a)[0].clone();

    let log = Rc::new(Log::default());
    for object in [&a, &b, &dune] {
        object.attach(log.clone()).unwrap();
    }
    b.list(attr(&SHELF, "books"))
        .unwrap()
        .insert(0, &dune)
        .unwrap();

    assert_eq!(
        *log.0.borrow(),
        vec!["remove 0", "insert 0", "parent true"]
    );
}

#[test]
fn test_reinserting_in_same_list_is_a_move() {
    let library = catalogue();
    let a = shelves(&library)[0].clone();
    let list = a.list(attr(&SHELF, "books")).unwrap();
    let dune = books(&a)[0].clone();

    let log = Rc::new(Log::default());
    a.attach(log.clone()).unwrap();
    dune.attach(log.clone()).unwrap();
    list.push(&dune).unwrap();

    assert_eq!(*log.0.borrow(), vec!["move 0 1"]);
    assert_eq!(books(&a)[1], dune);
    assert_consistent(&library);
}

#[test]
fn test_cycles_are_rejected_without_changes() {
    let library = catalogue();
    let outer = shelves(&library)[0].clone();
    let inner = shelf("inner", &[]);
    let sections = attr(&SHELF, "sections");
    outer.list(sections).unwrap().push(&inner).unwrap();

    let err = outer.list(sections).unwrap().push(&outer).unwrap_err();
    assert!(matches!(err, ModelError::SelfContainment { .. }));

    let err = inner.list(sections).unwrap().push(&outer).unwrap_err();
    assert!(matches!(err, ModelError::ContainmentCycle { .. }));
    assert_eq!(outer.parent(), Some(library.clone()));
    assert_eq!(inner.parent(), Some(outer.clone()));

    let err = outer.list(attr(&SHELF, "books")).unwrap().push(&inner).unwrap_err();
    assert!(matches!(err, ModelError::TypeMismatch { .. }));
    assert_consistent(&library);
}

#[test]
fn test_removing_detaches() {
    let library = catalogue();
    let a = shelves(&library)[0].clone();
    let odes = books(&a)[1].clone();

    let removed = a
        .list(attr(&SHELF, "books"))
        .unwrap()
        .remove(1)
        .unwrap();
    assert_eq!(removed.as_object(), Some(&odes));
    assert!(odes.parent().is_none());

    // references survive containment changes
    assert_eq!(
        library.value(attr(&LIBRARY, "featured")).unwrap().as_object(),
        Some(&odes)
    );
    assert_consistent(&library);
}

#[test]
fn test_deep_nesting() {
    let top = shelf("top", &[]);
    let mut current = top.clone();
    for depth in 0..2_000 {
        let next = shelf(&depth.to_string(), &[]);
        current.list(attr(&SHELF, "sections")).unwrap().push(&next).unwrap();
        current = next;
    }
    let leaf = book("leaf", 1);
    current.list(attr(&SHELF, "books")).unwrap().push(&leaf).unwrap();

    assert_eq!(leaf.root(), top);
    assert_eq!(leaf.ancestors().count(), 2_001);
    assert_eq!(top.descendants().count(), 2_001);
    assert_eq!(BOOK.name(), leaf.class().name());

    drop(current);
    drop(top);
    assert!(leaf.parent().is_none());
}
