//! A small library catalogue model declared through the public API only.

#![allow(dead_code)]

use modelkit::meta::{Attribute, Class, Literal, ValueType};
use modelkit::Object;
use once_cell::sync::Lazy;

pub const GENRES: &[&str] = &["Fiction", "Poetry", "Reference"];

pub static LIBRARY: Lazy<Class> = Lazy::new(|| {
    Class::builder("Library")
        .attribute(Attribute::id("id"))
        .attribute(Attribute::property("name", ValueType::String))
        .attribute(Attribute::reference("featured", || &*BOOK))
        .attribute(Attribute::reference("loans", || &*BOOK).list())
        .attribute(Attribute::child("shelves", || &*SHELF).list())
        .build()
});

pub static SHELF: Lazy<Class> = Lazy::new(|| {
    Class::builder("Shelf")
        .attribute(Attribute::id("id"))
        .attribute(Attribute::property("label", ValueType::String))
        .attribute(Attribute::child("books", || &*BOOK).list())
        .attribute(Attribute::child("sections", || &*SHELF).list())
        .attribute(Attribute::reference("see_also", || &*SHELF))
        .attribute(Attribute::reference("home", || &*LIBRARY))
        .build()
});

pub static BOOK: Lazy<Class> = Lazy::new(|| {
    Class::builder("Book")
        .attribute(Attribute::id("id"))
        .attribute(Attribute::property("title", ValueType::String))
        .attribute(Attribute::property("pages", ValueType::Int))
        .attribute(Attribute::property("published", ValueType::Date).nullable())
        .attribute(
            Attribute::property("genre", ValueType::Enum(GENRES)).default(Literal::Enum("Fiction")),
        )
        .attribute(Attribute::property("tags", ValueType::String).list())
        .build()
});

pub fn attr(class: &'static Class, name: &str) -> &'static Attribute {
    class.attribute(name).unwrap()
}

pub fn book(title: &str, pages: i32) -> Object {
    let book = Object::new(&BOOK);
    book.set(attr(&BOOK, "title"), title).unwrap();
    book.set(attr(&BOOK, "pages"), pages).unwrap();
    book
}

pub fn shelf(label: &str, books: &[&Object]) -> Object {
    let shelf = Object::new(&SHELF);
    shelf.set(attr(&SHELF, "label"), label).unwrap();
    let list = shelf.list(attr(&SHELF, "books")).unwrap();
    for book in books {
        list.push(*book).unwrap();
    }
    shelf
}

/// A library with two shelves, a featured book and two loans.
pub fn catalogue() -> Object {
    let library = Object::new(&LIBRARY);
    library.set(attr(&LIBRARY, "id"), "central").unwrap();
    library.set(attr(&LIBRARY, "name"), "Central Library").unwrap();

    let dune = book("Dune", 612);
    let odes = book("Odes", 90);
    let atlas = book("Atlas", 300);
    let shelves = library.list(attr(&LIBRARY, "shelves")).unwrap();
    shelves.push(shelf("A", &[&dune, &odes])).unwrap();
    shelves.push(shelf("B", &[&atlas])).unwrap();

    library.set(attr(&LIBRARY, "featured"), &odes).unwrap();
    let loans = library.list(attr(&LIBRARY, "loans")).unwrap();
    loans.push(&atlas).unwrap();
    loans.push(&dune).unwrap();
    library
}
