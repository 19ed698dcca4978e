#![allow(dead_code)]

use bson::{Document, doc};
use bookstore_catalog::store::MemoryStore;

/// (title, author, published_year, genre, price, in_stock)
pub const BOOKS: &[(&str, &str, i32, &str, f64, bool)] = &[
    ("To Kill a Mockingbird", "Harper Lee", 1960, "Fiction", 12.99, true),
    ("1984", "George Orwell", 1949, "Dystopian", 10.99, true),
    ("The Great Gatsby", "F. Scott Fitzgerald", 1925, "Fiction", 9.99, true),
    ("Brave New World", "Aldous Huxley", 1932, "Dystopian", 11.50, false),
    ("The Hobbit", "J.R.R. Tolkien", 1937, "Fantasy", 14.99, true),
    ("The Catcher in the Rye", "J.D. Salinger", 1951, "Fiction", 8.99, true),
    ("Pride and Prejudice", "Jane Austen", 1813, "Romance", 7.99, true),
    ("The Lord of the Rings", "J.R.R. Tolkien", 1954, "Fantasy", 19.99, true),
    ("Animal Farm", "George Orwell", 1945, "Political Satire", 8.50, false),
    ("The Alchemist", "Paulo Coelho", 1988, "Fiction", 10.99, true),
    ("Beloved", "Toni Morrison", 1987, "Fiction", 13.75, false),
    ("The Martian", "Andy Weir", 2011, "Science Fiction", 15.00, true),
    ("Project Hail Mary", "Andy Weir", 2021, "Science Fiction", 18.50, true),
    ("Klara and the Sun", "Kazuo Ishiguro", 2021, "Fiction", 16.25, false),
];

pub fn book_documents() -> Vec<Document> {
    BOOKS
        .iter()
        .map(|(title, author, year, genre, price, in_stock)| {
            doc! {
                "title": *title,
                "author": *author,
                "published_year": *year,
                "genre": *genre,
                "price": *price,
                "in_stock": *in_stock,
            }
        })
        .collect()
}

pub fn bookstore() -> MemoryStore {
    MemoryStore::with_documents(book_documents())
}
