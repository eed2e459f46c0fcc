const SHARK_ART: &str = r#"
                                ,-
                               ,'::|
                              /::::|
                            ,'::::o\                                     _..
         ____........-------,..::?88b                                  ,-' /
 _.--"". . . .      .   .  .  .  ""`-._                           ,-' .;'
<. - ::::o......  ...   . . .. . .  .  .""--._                  ,-'. .;'
 `-._  ` `":`:`:`::||||:::::::::::::::::.:. .  ""--._ ,'|     ,-'.  .;'
     ""_=--       //'doo.. ````:`:`::::::::::.:.:.:. .`-`._-'.   .;'
         ""--.__     P(      \               ` ``:`:``:::: .   .;'
                ""--.:-.     `.                             .:/
                  \. /    `-._   `.""-----.,-..::(--"".""`.  `:
                   `P         `-._ \          `-:\          `. `:
                                   ""            "            `-._)  -Seal
"#;

const CAT_ART: &str = r#"
                          __,,,,_
          _ ___.--'''`--''       `-.
      C`f' '                        `._
     /'`                         -..__ `-.
    /<"                 /       /    |`-._`-.____
   /  _.-.  .-\.___|    |      /|   |     `-.____)
   `-'  f/ |       /   / \    /  \   |
        `-'       |   |   \   \  |   |
               __/   /__.-'    ).'  |
              ((__.-'((____..-  \__.'
"#;

/// Banner art and the emoji that prefixes every reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArtStyle {
    #[default]
    Shark,
    Cat,
}

impl ArtStyle {
    pub const ALL: [ArtStyle; 2] = [ArtStyle::Shark, ArtStyle::Cat];

    pub fn name(self) -> &'static str {
        match self {
            ArtStyle::Shark => "shark",
            ArtStyle::Cat => "cat",
        }
    }

    pub fn art(self) -> &'static str {
        match self {
            ArtStyle::Shark => SHARK_ART,
            ArtStyle::Cat => CAT_ART,
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            ArtStyle::Shark => "🦈",
            ArtStyle::Cat => "🐱",
        }
    }

    /// Menu choice: the 1-based number or the style name.
    pub fn from_choice(choice: &str) -> Option<Self> {
        let choice = choice.trim();
        if let Ok(n) = choice.parse::<usize>() {
            return n.checked_sub(1).and_then(|i| Self::ALL.get(i).copied());
        }
        Self::ALL
            .into_iter()
            .find(|s| s.name().eq_ignore_ascii_case(choice))
    }
}
