//! Built-in class review content

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slide {
    pub title: &'static str,
    pub body: &'static str,
    /// Text sent to the speech endpoint
    pub narration: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizQuestion {
    pub prompt: &'static str,
    pub options: &'static [&'static str],
    pub answer: usize,
    pub explanation: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subject {
    pub id: &'static str,
    pub name: &'static str,
    pub slides: &'static [Slide],
    pub quiz: &'static [QuizQuestion],
}

pub static SUBJECTS: &[Subject] = &[
    Subject {
        id: "indian-climate",
        name: "Indian Climate",
        slides: &[
            Slide {
                title: "Monsoon Type Climate",
                body: "India has a tropical monsoon climate with seasonal reversal of winds.",
                narration: "India has a tropical monsoon type of climate. The defining feature is the seasonal reversal of wind direction between summer and winter.",
            },
            Slide {
                title: "Factors Affecting Climate",
                body: "Latitude, altitude, pressure and winds, distance from the sea, and relief.",
                narration: "The main factors shaping India's climate are latitude, altitude, pressure and wind systems, distance from the sea, and relief features such as the Himalayas.",
            },
            Slide {
                title: "Seasons of India",
                body: "Cold weather, hot weather, advancing monsoon, and retreating monsoon.",
                narration: "India experiences four seasons: the cold weather season, the hot weather season, the advancing monsoon, and the retreating monsoon.",
            },
        ],
        quiz: &[
            QuizQuestion {
                prompt: "Which winds bring most of India's rainfall?",
                options: &["Westerlies", "South-west monsoon winds", "Polar easterlies", "Loo"],
                answer: 1,
                explanation: "The south-west monsoon brings roughly three quarters of India's annual rainfall.",
            },
            QuizQuestion {
                prompt: "Which place receives the highest average annual rainfall?",
                options: &["Jaisalmer", "Leh", "Mawsynram", "Chennai"],
                answer: 2,
                explanation: "Mawsynram in Meghalaya records the highest average annual rainfall in the world.",
            },
        ],
    },
    Subject {
        id: "mughal-empire",
        name: "Mughal Empire",
        slides: &[
            Slide {
                title: "Foundation",
                body: "Babur founded the empire after the First Battle of Panipat in 1526.",
                narration: "The Mughal Empire was founded by Babur after he defeated Ibrahim Lodi at the First Battle of Panipat in 1526.",
            },
            Slide {
                title: "Akbar's Administration",
                body: "The mansabdari system and a centralised revenue administration.",
                narration: "Akbar consolidated the empire through the mansabdari system and a centralised land revenue administration under Todar Mal.",
            },
        ],
        quiz: &[QuizQuestion {
            prompt: "Who founded the Mughal Empire?",
            options: &["Akbar", "Humayun", "Babur", "Aurangzeb"],
            answer: 2,
            explanation: "Babur founded the empire in 1526.",
        }],
    },
    Subject {
        id: "fundamental-rights",
        name: "Fundamental Rights",
        slides: &[
            Slide {
                title: "Part III of the Constitution",
                body: "Articles 12 to 35 list the Fundamental Rights.",
                narration: "Fundamental Rights are enshrined in Part Three of the Constitution, from Article 12 to Article 35.",
            },
            Slide {
                title: "Right to Constitutional Remedies",
                body: "Article 32 lets citizens approach the Supreme Court directly.",
                narration: "Article 32, the right to constitutional remedies, allows citizens to move the Supreme Court directly to enforce their Fundamental Rights.",
            },
        ],
        quiz: &[QuizQuestion {
            prompt: "Which Article guarantees the right to constitutional remedies?",
            options: &["Article 14", "Article 21", "Article 32", "Article 44"],
            answer: 2,
            explanation: "Article 32 is called the heart and soul of the Constitution.",
        }],
    },
];

pub fn find_subject(id: &str) -> Option<&'static Subject> {
    SUBJECTS.iter().find(|s| s.id == id)
}
