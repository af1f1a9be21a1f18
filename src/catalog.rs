use crate::models::Movie;

const POSTER_BASE: &str = "https://image.tmdb.org/t/p/w500";

#[allow(clippy::too_many_arguments)]
fn movie(
    id: &str,
    title: &str,
    translated_title: &str,
    year: i16,
    director: &str,
    genre: &str,
    actors: &str,
    plot: &str,
    poster: &str,
    rating: f32,
    duration: Option<u32>,
) -> Movie {
    Movie {
        id: id.to_string(),
        title: title.to_string(),
        translated_title: Some(translated_title.to_string()),
        year: Some(year),
        director: director.to_string(),
        genre: genre.to_string(),
        actors: actors.to_string(),
        plot: plot.to_string(),
        poster: format!("{POSTER_BASE}{poster}"),
        rating,
        duration,
        country: None,
        language: None,
    }
}

/// The curated catalog searched by default.
pub fn movies() -> Vec<Movie> {
    let catalog = vec![
        movie(
            "1",
            "The Shawshank Redemption",
            "Shoushenk qamoqxonasidan qochish",
            1994,
            "Frank Darabont",
            "Drama",
            "Tim Robbins, Morgan Freeman",
            "Two imprisoned men bond over a number of years, finding solace and eventual redemption through acts of common decency.",
            "/q6y0Go1tsGEsmtFryDOJo3dEmqu.jpg",
            9.3,
            Some(142),
        ),
        movie(
            "2",
            "The Godfather",
            "Krestnyy otets",
            1972,
            "Francis Ford Coppola",
            "Crime, Drama",
            "Marlon Brando, Al Pacino",
            "The aging patriarch of an organized crime dynasty transfers control of his clandestine empire to his reluctant son.",
            "/3bhkrj58Vtu7enYsRolD1fZdja1.jpg",
            9.2,
            Some(175),
        ),
        movie(
            "3",
            "The Dark Knight",
            "Qorong'u ritsar",
            2008,
            "Christopher Nolan",
            "Action, Crime, Drama",
            "Christian Bale, Heath Ledger",
            "When the menace known as the Joker emerges from his mysterious past, he wreaks havoc and chaos on the people of Gotham.",
            "/qJ2tW6WMUDux911r6m7haRef0WH.jpg",
            9.0,
            Some(152),
        ),
        movie(
            "4",
            "Pulp Fiction",
            "Arzon fantastika",
            1994,
            "Quentin Tarantino",
            "Crime, Drama",
            "John Travolta, Uma Thurman, Samuel L. Jackson",
            "The lives of two mob hitmen, a boxer, a gangster and his wife, and a pair of diner bandits intertwine in four tales of violence and redemption.",
            "/d5iIlFn5s0ImszYzBPb8JPIfbXD.jpg",
            8.9,
            Some(154),
        ),
        movie(
            "5",
            "Forrest Gump",
            "Forrest Gamp",
            1994,
            "Robert Zemeckis",
            "Drama, Romance",
            "Tom Hanks, Robin Wright",
            "The presidencies of Kennedy and Johnson, the Vietnam War, Watergate and other history unfold from the perspective of an Alabama man with an IQ of 75.",
            "/saHP97rTPS5eLmrLQEcANmKrsFl.jpg",
            8.8,
            Some(142),
        ),
    ];

    catalog
        .into_iter()
        .map(|m| Movie { country: Some("us".to_string()), language: Some("en".to_string()), ..m })
        .collect()
}

/// Shown to everybody above the search results.
pub fn trending() -> Vec<Movie> {
    vec![
        movie(
            "trending-1",
            "Dune: Part Two",
            "Qum: Ikkinchi qism",
            2024,
            "Denis Villeneuve",
            "Sci-Fi, Adventure",
            "Timothée Chalamet, Zendaya",
            "Paul Atreides unites with the Fremen to wage war against the Harkonnens.",
            "/1pdfLvkbY9ohJlCjQH2CZjjYVvJ.jpg",
            8.5,
            None,
        ),
        movie(
            "trending-2",
            "Oppenheimer",
            "Oppengeimer",
            2023,
            "Christopher Nolan",
            "Drama, History",
            "Cillian Murphy, Emily Blunt",
            "The story of J. Robert Oppenheimer and the making of the atomic bomb.",
            "/8Gxv8gSFCU0XGDykEGv7zR1n2ua.jpg",
            8.3,
            None,
        ),
        movie(
            "trending-3",
            "Spider-Man: Across the Spider-Verse",
            "O'rgimchak-odam: O'rgimchak-olam bo'ylab",
            2023,
            "Joaquim Dos Santos",
            "Animation, Action",
            "Shameik Moore, Hailee Steinfeld",
            "Miles Morales travels across the multiverse and meets a team of Spider-People.",
            "/8Vt6mWEReuy4Of61Lnj5Xj704m8.jpg",
            8.7,
            None,
        ),
    ]
}

/// Shown to signed-in users.
pub fn recommended() -> Vec<Movie> {
    vec![
        movie(
            "rec-1",
            "Inception",
            "Boshlanish",
            2010,
            "Christopher Nolan",
            "Sci-Fi, Thriller",
            "Leonardo DiCaprio, Joseph Gordon-Levitt",
            "A thief who steals secrets through dreams is given the task of planting an idea.",
            "/9gk7adHYeDvHkCSEqAvQNLV5Uge.jpg",
            8.8,
            None,
        ),
        movie(
            "rec-2",
            "Interstellar",
            "Yulduzlararo",
            2014,
            "Christopher Nolan",
            "Sci-Fi, Drama",
            "Matthew McConaughey, Anne Hathaway",
            "A team of explorers travels through a wormhole in an attempt to save humanity.",
            "/gEU2QniE6E77NI6lCU6MxlNBvIx.jpg",
            8.6,
            None,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn ids_are_unique_across_lists() {
        let all: Vec<Movie> =
            movies().into_iter().chain(trending()).chain(recommended()).collect();
        let ids: HashSet<_> = all.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids.len(), all.len());
    }

    #[test]
    fn catalog_movies_carry_full_metadata() {
        for m in movies() {
            assert!(m.duration.is_some(), "{} has no duration", m.title);
            assert_eq!(m.country.as_deref(), Some("us"));
            assert!(m.poster.starts_with(POSTER_BASE));
        }
    }
}
